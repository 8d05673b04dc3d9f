//! Error Taxonomy
//!
//! One error enum per layer. Lower layers are wrapped by the layers above them so
//! the caller can tell "the coordination service is unreachable" apart from
//! "the request itself was wrong".
//!
//! Conditions that are *not* errors in this system (a record vanishing between a
//! listing and a read, zero workers at query time, a single worker failing) are
//! modelled as `Option::None`, empty results and log lines instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the coordination substrate (local or remote).
///
/// Serializable because the networked substrate sends them over the wire as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinationError {
    #[error("connection to the coordination service was lost")]
    ConnectionLoss,

    #[error("coordination session expired")]
    SessionExpired,

    #[error("node does not exist: {0}")]
    NoNode(String),

    #[error("node already exists: {0}")]
    NodeExists(String),

    #[error("node has children: {0}")]
    NotEmpty(String),

    #[error("ephemeral nodes cannot have children: {0}")]
    NoChildrenForEphemerals(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("coordination transport error: {0}")]
    Transport(String),

    #[error("coordination protocol error: {0}")]
    Protocol(String),
}

impl CoordinationError {
    /// True when the session cannot currently talk to the substrate at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CoordinationError::ConnectionLoss
                | CoordinationError::SessionExpired
                | CoordinationError::Transport(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum MembershipError {
    /// The substrate session is not connected (or is gone for good).
    #[error("coordination unavailable: {0}")]
    CoordinationUnavailable(#[source] CoordinationError),

    #[error("coordination error: {0}")]
    Coordination(#[source] CoordinationError),
}

impl From<CoordinationError> for MembershipError {
    fn from(err: CoordinationError) -> Self {
        if err.is_unavailable() {
            MembershipError::CoordinationUnavailable(err)
        } else {
            MembershipError::Coordination(err)
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("membership unavailable: {0}")]
    MembershipUnavailable(#[from] MembershipError),
}

#[derive(Debug, Clone, Error)]
pub enum ElectionError {
    #[error("node has not volunteered for leadership")]
    NotVolunteered,

    /// The local candidate record is no longer listed (its session ended).
    #[error("candidate record {0} is missing from the election namespace")]
    CandidateMissing(String),

    #[error(transparent)]
    Membership(#[from] MembershipError),
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The coordinator cannot determine which workers exist.
    #[error("membership unavailable: {0}")]
    MembershipUnavailable(#[from] RegistryError),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The document collection could not be listed.
    #[error("documents unavailable: {0}")]
    DocumentsUnavailable(String),

    #[error("failed to encode response: {0}")]
    Encode(String),
}
