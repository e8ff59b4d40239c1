//! Session management with settings-store persistence.
//!
//! The session (token, user id, user name) is held as one value and read
//! atomically: callers get the whole [`Session`] or nothing, never a
//! token paired with a stale user id. It is mutated only by login/logout
//! and cleared entirely on logout.

use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::models::Session;
use crate::storage::Storage;

const SESSION_KEY: &str = "session";

/// Shared, cloneable handle to the current session.
///
/// Passed explicitly into each component constructor instead of being an
/// ambient global.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    storage: Option<Storage>,
    session: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Create a store backed by the settings store, restoring any
    /// persisted session.
    pub fn new(storage: Storage) -> Self {
        let session = storage.load::<Session>(SESSION_KEY);
        Self {
            inner: Arc::new(Inner {
                storage: Some(storage),
                session: RwLock::new(session),
            }),
        }
    }

    /// Create a store with no persistence (used by tests).
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                storage: None,
                session: RwLock::new(None),
            }),
        }
    }

    /// Atomically read the whole current session.
    pub fn snapshot(&self) -> Option<Session> {
        self.inner.session.read().expect("session lock poisoned").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.snapshot().map(|s| s.user_id)
    }

    pub fn user_name(&self) -> Option<String> {
        self.snapshot().map(|s| s.user_name)
    }

    pub fn access_token(&self) -> Option<String> {
        self.snapshot().map(|s| s.access_token)
    }

    /// Replace the session after a successful login and persist it. A
    /// failed write leaves the in-memory session intact; the session just
    /// will not survive a restart.
    pub fn set(&self, session: Session) {
        if let Some(storage) = &self.inner.storage {
            if !storage.save(SESSION_KEY, &session) {
                warn!("failed to persist session");
            }
        }
        *self.inner.session.write().expect("session lock poisoned") = Some(session);
    }

    /// Update the stored display name after a profile edit.
    pub fn update_user_name(&self, user_name: &str) {
        let mut guard = self.inner.session.write().expect("session lock poisoned");
        if let Some(session) = guard.as_mut() {
            session.user_name = user_name.to_string();
            if let Some(storage) = &self.inner.storage {
                if !storage.save(SESSION_KEY, session) {
                    warn!("failed to persist updated user name");
                }
            }
        }
    }

    /// Logout: drop the in-memory session and clear persisted state.
    pub fn clear(&self) {
        if let Some(storage) = &self.inner.storage {
            storage.remove(SESSION_KEY);
        }
        *self.inner.session.write().expect("session lock poisoned") = None;
    }
}
