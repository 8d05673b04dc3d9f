//! Search Module
//!
//! Distributed TF-IDF search. The coordinator tokenizes the query, splits the
//! document list across the live workers, fans the slices out concurrently and
//! ranks whatever comes back; workers compute per-document term frequencies for
//! the slice they were given.
//!
//! ## Submodules
//! - **`tokenizer`**: Splits text into tokens.
//! - **`tfidf`**: Pure scoring functions (TF, IDF, score, grouped ranking).
//! - **`partition`**: Contiguous document slices, one per worker.
//! - **`coordinator`** / **`worker`**: The two request handlers of the cluster.
//! - **`documents`**: Where document text and metadata come from.
//! - **`transport`**: How the coordinator reaches workers.
//! - **`protocol`** / **`types`**: Wire messages and shared data types.

pub mod coordinator;
pub mod documents;
pub mod partition;
pub mod protocol;
pub mod tfidf;
pub mod tokenizer;
pub mod transport;
pub mod types;
pub mod worker;

pub use coordinator::SearchCoordinator;
pub use worker::SearchWorker;

#[cfg(test)]
mod tests;
