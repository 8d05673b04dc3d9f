//! TF-IDF Scoring
//!
//! Stateless functions; safe to call from any number of tasks at once.
//!
//! Term comparison ignores case. The IDF denominator is the number of
//! *result-bearing* documents in the aggregated corpus, i.e. documents where at
//! least one query term occurs; documents whose data never arrived from a
//! worker are absent from the corpus and therefore do not count either.

use std::collections::HashMap;

use super::types::{Corpus, DocumentData, ScoreGroup};

/// Occurrences of `term` in `tokens` divided by the number of tokens.
/// `0.0` for an empty token list.
pub fn term_frequency(tokens: &[String], term: &str) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }

    let term = term.to_lowercase();
    let count = tokens
        .iter()
        .filter(|token| token.to_lowercase() == term)
        .count();

    count as f64 / tokens.len() as f64
}

pub fn document_data(tokens: &[String], terms: &[String]) -> DocumentData {
    let mut data = DocumentData::new();
    for term in terms.iter() {
        data.put_term_frequency(term, term_frequency(tokens, term));
    }
    data
}

fn result_bearing_documents(corpus: &Corpus) -> usize {
    corpus.values().filter(|data| data.has_occurrences()).count()
}

/// `log10(total / nt)` where `nt` counts documents containing `term`;
/// `0.0` when no document contains it.
pub fn inverse_document_frequency(term: &str, corpus: &Corpus) -> f64 {
    let containing = corpus
        .values()
        .filter(|data| data.frequency(term) > 0.0)
        .count();

    if containing == 0 {
        return 0.0;
    }

    let total = result_bearing_documents(corpus);
    (total as f64 / containing as f64).log10()
}

pub fn term_to_idf(terms: &[String], corpus: &Corpus) -> HashMap<String, f64> {
    terms
        .iter()
        .map(|term| (term.clone(), inverse_document_frequency(term, corpus)))
        .collect()
}

pub fn score(terms: &[String], data: &DocumentData, idf: &HashMap<String, f64>) -> f64 {
    terms
        .iter()
        .map(|term| data.frequency(term) * idf.get(term).copied().unwrap_or(0.0))
        .sum()
}

/// Groups documents by exact score, highest score first. Inside a group the
/// documents keep corpus order.
pub fn rank_descending(corpus: &Corpus, terms: &[String]) -> Vec<ScoreGroup> {
    let idf = term_to_idf(terms, corpus);
    let mut groups: Vec<ScoreGroup> = Vec::new();

    for (document, data) in corpus.iter() {
        let document_score = score(terms, data, &idf);

        match groups.iter_mut().find(|group| group.score == document_score) {
            Some(group) => group.documents.push(document.clone()),
            None => groups.push(ScoreGroup {
                score: document_score,
                documents: vec![document.clone()],
            }),
        }
    }

    groups.sort_by(|a, b| b.score.total_cmp(&a.score));
    groups
}
