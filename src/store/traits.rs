//! `SessionStore` trait — single async interface for session persistence.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::Session;

/// Backend-agnostic session storage.
///
/// `load` of an id that was never saved returns a fresh session under that
/// id rather than an error; a new conversation and a resumed one go through
/// the same code path. Concurrent saves of the same id are last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session for `id`, or a fresh one if none exists.
    async fn load(&self, id: &str) -> Result<Session, StoreError>;

    /// Persist the session. Replaces any prior state for the same id.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Delete all sessions not updated within `ttl`.
    /// Returns the number of sessions removed.
    async fn prune_older_than(&self, ttl: Duration) -> Result<usize, StoreError>;
}
