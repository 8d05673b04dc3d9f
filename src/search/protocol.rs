//! Search Network Protocol
//!
//! Endpoints and messages exchanged between the ui gateway, the coordinator and
//! the workers. Bodies are bincode-encoded and sent as
//! `application/octet-stream`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use super::types::{Task, TaskResult};

/// Coordinator endpoint receiving `SearchRequest`s.
pub const ENDPOINT_SEARCH: &str = "/search";
/// Worker endpoint receiving `Task`s.
pub const ENDPOINT_TASK: &str = "/task";
pub const ENDPOINT_STATUS: &str = "/status";

pub const CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub relevant_documents: Vec<DocumentStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub document_name: String,
    pub score: f64,
    pub document_size: u64,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(value)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}
