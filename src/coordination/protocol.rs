//! Coordination Server Protocol
//!
//! JSON DTOs and endpoints spoken between `RemoteCoordinator` clients and the
//! coordination server. Every reply body is a `Reply<T>`, so substrate errors
//! travel to the client unchanged and are re-raised there.
//!
//! Watches are not pushed. A read with `watch: true` returns a `watch_id`; the
//! client then long-polls `ENDPOINT_WATCH` with it until the event arrives.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::{CreateMode, SessionId, Stat, WatchedEvent};
use crate::error::CoordinationError;

pub const ENDPOINT_SESSION_OPEN: &str = "/coord/session/open";
pub const ENDPOINT_SESSION_KEEPALIVE: &str = "/coord/session/keepalive";
pub const ENDPOINT_SESSION_CLOSE: &str = "/coord/session/close";
pub const ENDPOINT_CREATE: &str = "/coord/create";
pub const ENDPOINT_DELETE: &str = "/coord/delete";
pub const ENDPOINT_EXISTS: &str = "/coord/exists";
pub const ENDPOINT_CHILDREN: &str = "/coord/children";
pub const ENDPOINT_DATA: &str = "/coord/data";
pub const ENDPOINT_WATCH: &str = "/coord/watch";

/// How long the server holds a watch poll open before answering "nothing yet".
pub const WATCH_POLL_WINDOW: Duration = Duration::from_secs(25);

pub type Reply<T> = Result<T, CoordinationError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub session_id: SessionId,
    pub path: String,
    pub data: Vec<u8>,
    pub mode: CreateMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PathRequest {
    pub session_id: SessionId,
    pub path: String,
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub stat: Option<Stat>,
    pub watch_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChildrenResponse {
    pub children: Vec<String>,
    pub watch_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchPollRequest {
    pub session_id: SessionId,
    pub watch_id: String,
}

/// `event` is `None` when the poll window elapsed without a change.
#[derive(Debug, Serialize, Deserialize)]
pub struct WatchPollResponse {
    pub event: Option<WatchedEvent>,
}
