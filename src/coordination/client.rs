//! Coordination Client Interface
//!
//! The primitives the cluster consumes from the coordination substrate. Both the
//! in-process `MemorySession` and the HTTP `RemoteCoordinator` implement it, so
//! membership, registry and election code never know which one they talk to.

use async_trait::async_trait;

use super::types::{CreateMode, SessionId, Stat, Watch};
use crate::error::CoordinationError;

#[async_trait]
pub trait CoordinationClient: Send + Sync + 'static {
    /// The session every call of this client runs in.
    fn session_id(&self) -> &SessionId;

    /// Whether the session can currently reach the substrate.
    fn is_connected(&self) -> bool;

    /// Creates a record and returns its full path. For sequential modes the
    /// returned path carries the substrate-assigned suffix.
    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError>;

    async fn delete(&self, path: &str) -> Result<(), CoordinationError>;

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordinationError>;

    /// Like `exists`, and arms a one-shot watch that fires when the record is
    /// created or deleted.
    async fn watch_exists(
        &self,
        path: &str,
    ) -> Result<(Option<Stat>, Watch), CoordinationError>;

    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError>;

    /// Like `get_children`, and arms a one-shot watch that fires on the next
    /// child creation/deletion (or deletion of the record itself).
    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, Watch), CoordinationError>;

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError>;

    /// Ends the session. Ephemeral records owned by it are removed.
    async fn close(&self);
}
