use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use super::documents::DocumentStore;
use super::partition::split_documents;
use super::protocol::{DocumentStats, SearchRequest, SearchResponse, decode, encode};
use super::tfidf::rank_descending;
use super::tokenizer::tokenize;
use super::transport::WorkerTransport;
use super::types::{Corpus, RankedResult, SearchReport, Task, TaskResult};
use crate::error::SearchError;
use crate::registry::ServiceRegistry;

pub struct SearchCoordinator {
    workers: Arc<ServiceRegistry>,
    transport: Arc<dyn WorkerTransport>,
    documents: Arc<dyn DocumentStore>,
    task_timeout: Duration,
}

impl SearchCoordinator {
    pub fn new(
        workers: Arc<ServiceRegistry>,
        transport: Arc<dyn WorkerTransport>,
        documents: Arc<dyn DocumentStore>,
        task_timeout: Duration,
    ) -> Self {
        Self {
            workers,
            transport,
            documents,
            task_timeout,
        }
    }

    pub async fn handle_search(&self, query: &str) -> Result<Vec<RankedResult>, SearchError> {
        Ok(self.search(query).await?.results)
    }

    /// Runs one query across the live workers.
    ///
    /// No workers is not an error: the report is simply empty. A worker that
    /// fails or does not answer within the task timeout contributes nothing,
    /// and the ranking is computed from the documents that did come back.
    pub async fn search(&self, query: &str) -> Result<SearchReport, SearchError> {
        let terms = tokenize(query);

        let workers = self.workers.get_all_service_addresses().await?;
        if workers.is_empty() {
            tracing::info!("No search workers currently available");
            return Ok(SearchReport::default());
        }

        let documents = self
            .documents
            .list_documents()
            .await
            .map_err(|e| SearchError::DocumentsUnavailable(e.to_string()))?;

        let slices = split_documents(workers.len(), &documents);
        let tasks_sent = slices.len();

        let calls = slices
            .into_iter()
            .zip(workers.addresses().iter())
            .map(|(slice, address)| {
                let task = Task {
                    search_terms: terms.clone(),
                    documents: slice,
                };
                self.dispatch(address, task)
            });

        let mut corpus = Corpus::new();
        let mut responses_received = 0;
        for result in join_all(calls).await.into_iter().flatten() {
            responses_received += 1;
            corpus.extend(result.documents);
        }

        tracing::info!("Received {}/{} results", responses_received, tasks_sent);

        let mut results = Vec::with_capacity(corpus.len());
        for group in rank_descending(&corpus, &terms) {
            for document in group.documents {
                results.push(self.ranked(document, group.score).await);
            }
        }

        Ok(SearchReport {
            results,
            tasks_sent,
            responses_received,
        })
    }

    async fn dispatch(&self, address: &str, task: Task) -> Option<TaskResult> {
        let payload = match encode(&task) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode task for {}: {}", address, e);
                return None;
            }
        };

        tracing::debug!(
            "Sending task with {} documents to {}",
            task.documents.len(),
            address
        );

        let call = self.transport.send_task(address, payload);
        match tokio::time::timeout(self.task_timeout, call).await {
            Ok(Ok(bytes)) => match decode::<TaskResult>(&bytes) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("Worker {} sent an unreadable result: {}", address, e);
                    None
                }
            },
            Ok(Err(e)) => {
                tracing::warn!("Task to worker {} failed: {}", address, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Worker {} did not answer within {:?}",
                    address,
                    self.task_timeout
                );
                None
            }
        }
    }

    async fn ranked(&self, document_id: String, score: f64) -> RankedResult {
        let (document_name, document_size) = match self.documents.describe(&document_id).await {
            Ok(info) => (info.name, info.size),
            Err(e) => {
                tracing::debug!("No metadata for {}: {}", document_id, e);
                (document_id.clone(), 0)
            }
        };

        RankedResult {
            document_id,
            score,
            document_name,
            document_size,
        }
    }

    /// Wire entry point: bincode `SearchRequest` in, bincode `SearchResponse` out.
    pub async fn handle_request(&self, payload: &[u8]) -> Result<Vec<u8>, SearchError> {
        let request: SearchRequest =
            decode(payload).map_err(|e| SearchError::MalformedRequest(e.to_string()))?;
        tracing::info!("Received search query: {}", request.search_query);

        let results = self.handle_search(&request.search_query).await?;
        let response = SearchResponse {
            relevant_documents: results
                .into_iter()
                .map(|result| DocumentStats {
                    document_name: result.document_name,
                    score: result.score,
                    document_size: result.document_size,
                })
                .collect(),
        };

        encode(&response).map_err(|e| SearchError::Encode(e.to_string()))
    }
}
