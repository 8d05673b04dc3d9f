use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

/// Width of the zero-padded counter appended to sequential record names.
pub const SEQUENCE_WIDTH: usize = 10;

/// Identifies one client session with the substrate.
///
/// Ephemeral records are owned by the session that created them and vanish
/// when it ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    PersistentSequential,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Metadata of a record, returned by `exists`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stat {
    /// Logical creation order across the whole tree.
    pub created_at: u64,
    pub ephemeral_owner: Option<SessionId>,
    pub num_children: usize,
    pub data_length: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    NodeCreated,
    NodeDeleted,
    NodeChildrenChanged,
}

/// A delivered change notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub path: String,
}

/// A one-shot watch. Resolves once with the event that fired it; resolves with a
/// closed-channel error when the owning session ended before anything changed.
pub type Watch = tokio::sync::oneshot::Receiver<WatchedEvent>;

/// Checks a record path: absolute, no empty segments, no trailing slash.
pub fn validate_path(path: &str) -> Result<(), CoordinationError> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(CoordinationError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Parent of a non-root path (`/a/b` -> `/a`, `/a` -> `/`).
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Joins a namespace and a child name.
pub fn join_path(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Last segment of a path (`/election/c_0000000003` -> `c_0000000003`).
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Sequence number encoded in the trailing digits of a sequential record name.
pub fn sequence_of(name: &str) -> Option<u64> {
    if name.len() < SEQUENCE_WIDTH {
        return None;
    }
    let suffix = &name[name.len() - SEQUENCE_WIDTH..];
    if suffix.bytes().all(|b| b.is_ascii_digit()) {
        suffix.parse().ok()
    } else {
        None
    }
}
