//! Sharecircle client core.
//!
//! This crate contains the connectivity and synchronization core of the
//! sharecircle mobile client: an HTTP API client, a per-room WebSocket
//! subscription manager, and a feed synchronizer that reconciles posts,
//! likes, and comments against the backend.
//!
//! UI rendering, navigation, and platform image handling live in the host
//! application shell; this crate only moves data and owns in-memory state.

pub mod api_client;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod rooms;
pub mod session;
pub mod storage;

pub use api_client::ApiClient;
pub use config::{ClientConfig, ReconnectConfig};
pub use error::{ApiError, StreamError};
pub use feed::FeedSynchronizer;
pub use rooms::{ConnectionState, RoomSubscription};
pub use session::SessionStore;
pub use storage::Storage;
