use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Term frequencies of one document for the terms of one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    term_to_frequency: HashMap<String, f64>,
}

impl DocumentData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_term_frequency(&mut self, term: &str, frequency: f64) {
        self.term_to_frequency.insert(term.to_string(), frequency);
    }

    /// Frequency of `term`, `0.0` when it was never recorded.
    pub fn frequency(&self, term: &str) -> f64 {
        self.term_to_frequency.get(term).copied().unwrap_or(0.0)
    }

    /// True when at least one recorded term occurs in the document.
    pub fn has_occurrences(&self) -> bool {
        self.term_to_frequency.values().any(|frequency| *frequency > 0.0)
    }
}

/// Document id to term frequencies, in corpus order.
pub type Corpus = IndexMap<String, DocumentData>;

/// Work sent to one worker: the query terms and its slice of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub search_terms: Vec<String>,
    pub documents: Vec<String>,
}

/// A worker's answer, keyed by document id in the order of its slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub documents: Corpus,
}

/// Documents that share one exact score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGroup {
    pub score: f64,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub document_id: String,
    pub score: f64,
    pub document_name: String,
    pub document_size: u64,
}

/// Outcome of one query, including how many worker calls were sent and how
/// many answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchReport {
    pub results: Vec<RankedResult>,
    pub tasks_sent: usize,
    pub responses_received: usize,
}
