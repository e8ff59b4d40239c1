//! Error types for API calls and room streams.

use thiserror::Error;

/// Error type for one-shot HTTP API calls.
///
/// Every failure is surfaced to the caller; the core never log-and-ignores.
/// All variants are per-operation and recoverable by retry or user action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server was unreachable or the connection failed mid-request.
    #[error("network error: {0}")]
    Network(String),

    /// The server rejected the credentials on an authenticated call.
    #[error("authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// Any other non-2xx response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// A required field was empty or invalid before submit.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ApiError {
    /// Classify a non-2xx response. 401/403 mean the bearer token was
    /// missing, expired, or insufficient; everything else is a plain
    /// HTTP failure.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if status == 401 || status == 403 {
            ApiError::Auth { status, body }
        } else {
            ApiError::Http { status, body }
        }
    }
}

/// Error type for the per-room message stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// A send was attempted while the room was not in the `Joined` state.
    /// The message is not queued; the caller decides whether to retry.
    #[error("not joined to room")]
    NotJoined,

    /// The subscription was closed and can no longer accept commands.
    #[error("stream closed")]
    Closed,

    /// The underlying WebSocket failed.
    #[error("websocket transport error: {0}")]
    Transport(String),
}
