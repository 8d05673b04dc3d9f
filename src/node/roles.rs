use std::sync::Arc;

use crate::error::SearchError;
use crate::search::protocol::{ENDPOINT_SEARCH, ENDPOINT_TASK};
use crate::search::{SearchCoordinator, SearchWorker};

/// What the node's web server is currently serving. A node is exactly one of
/// these at a time.
#[derive(Clone)]
pub enum ServiceEndpoint {
    Coordinator(Arc<SearchCoordinator>),
    Worker(Arc<SearchWorker>),
}

impl ServiceEndpoint {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ServiceEndpoint::Coordinator(_) => ENDPOINT_SEARCH,
            ServiceEndpoint::Worker(_) => ENDPOINT_TASK,
        }
    }

    pub fn role_name(&self) -> &'static str {
        match self {
            ServiceEndpoint::Coordinator(_) => "coordinator",
            ServiceEndpoint::Worker(_) => "worker",
        }
    }

    pub async fn handle_request(&self, payload: &[u8]) -> Result<Vec<u8>, SearchError> {
        match self {
            ServiceEndpoint::Coordinator(coordinator) => coordinator.handle_request(payload).await,
            ServiceEndpoint::Worker(worker) => worker.handle_request(payload).await,
        }
    }
}
