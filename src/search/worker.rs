use std::sync::Arc;

use super::documents::DocumentStore;
use super::protocol::{decode, encode};
use super::tfidf::document_data;
use super::tokenizer::tokenize;
use super::types::{Task, TaskResult};
use crate::error::SearchError;

/// Computes term frequencies for the documents a coordinator assigns to it.
/// Keeps no state between tasks.
pub struct SearchWorker {
    documents: Arc<dyn DocumentStore>,
}

impl SearchWorker {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn process_task(&self, task: Task) -> TaskResult {
        let mut result = TaskResult::default();

        for document in task.documents {
            match self.documents.read_text(&document).await {
                Ok(text) => {
                    let tokens = tokenize(&text);
                    let data = document_data(&tokens, &task.search_terms);
                    result.documents.insert(document, data);
                }
                Err(e) => tracing::warn!("Skipping unreadable document {}: {}", document, e),
            }
        }

        result
    }

    pub async fn handle_request(&self, payload: &[u8]) -> Result<Vec<u8>, SearchError> {
        let task: Task =
            decode(payload).map_err(|e| SearchError::MalformedRequest(e.to_string()))?;
        tracing::info!("Received {} documents to process", task.documents.len());

        let result = self.process_task(task).await;
        encode(&result).map_err(|e| SearchError::Encode(e.to_string()))
    }
}
