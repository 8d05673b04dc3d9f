//! Search Module Tests
//!
//! Validates the search pipeline from tokenization to the ranked response.
//!
//! ## Test Scopes
//! - **Tokenizer**: separators, empty tokens, case preservation.
//! - **Scoring**: TF/IDF edge cases and stable grouped ranking.
//! - **Partitioning**: every document assigned exactly once, in order.
//! - **Coordination**: fan-out over an in-process transport, partial failures,
//!   timeouts, no capacity, malformed payloads.
//! - **Documents**: the file-system store.

#[cfg(test)]
mod tests {
    use crate::coordination::client::CoordinationClient;
    use crate::coordination::memory::MemoryCoordinator;
    use crate::error::{SearchError, TransportError};
    use crate::membership::MembershipStore;
    use crate::registry::{ServiceRegistry, WORKERS_REGISTRY_NAMESPACE};
    use crate::search::documents::{DocumentStore, FsDocumentStore, InMemoryDocumentStore};
    use crate::search::partition::split_documents;
    use crate::search::protocol::{SearchRequest, SearchResponse, decode, encode};
    use crate::search::tfidf::*;
    use crate::search::tokenizer::tokenize;
    use crate::search::transport::WorkerTransport;
    use crate::search::types::{Corpus, DocumentData, Task, TaskResult};
    use crate::search::{SearchCoordinator, SearchWorker};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn animals() -> Arc<InMemoryDocumentStore> {
        Arc::new(
            InMemoryDocumentStore::new()
                .with_document("A", "cat dog")
                .with_document("B", "dog dog cat")
                .with_document("C", "bird"),
        )
    }

    /// Delivers tasks to in-process workers. Unknown addresses fail like an
    /// unreachable host; `slow` addresses never answer in time.
    struct LocalTransport {
        workers: HashMap<String, Arc<SearchWorker>>,
        slow: HashSet<String>,
    }

    #[async_trait]
    impl WorkerTransport for LocalTransport {
        async fn send_task(
            &self,
            address: &str,
            payload: Vec<u8>,
        ) -> Result<Vec<u8>, TransportError> {
            if self.slow.contains(address) {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            match self.workers.get(address) {
                Some(worker) => worker
                    .handle_request(&payload)
                    .await
                    .map_err(|e| TransportError::Http(e.to_string())),
                None => Err(TransportError::Status(503)),
            }
        }
    }

    /// A coordinator whose worker registry lists `addresses` in order. Only
    /// the addresses in `healthy` are served by a worker.
    async fn coordinator_with(
        addresses: &[&str],
        healthy: &[&str],
        slow: &[&str],
        documents: Arc<InMemoryDocumentStore>,
    ) -> (SearchCoordinator, Arc<MemoryCoordinator>) {
        let substrate = MemoryCoordinator::new();

        for address in addresses {
            let store = MembershipStore::new(Arc::new(substrate.connect()));
            let registry = ServiceRegistry::new(store, WORKERS_REGISTRY_NAMESPACE)
                .await
                .unwrap();
            registry.register_to_cluster(address).await.unwrap();
        }

        let store = MembershipStore::new(Arc::new(substrate.connect()));
        let registry = ServiceRegistry::new(store, WORKERS_REGISTRY_NAMESPACE)
            .await
            .unwrap();

        let worker = Arc::new(SearchWorker::new(documents.clone()));
        let transport = LocalTransport {
            workers: healthy
                .iter()
                .map(|address| (address.to_string(), worker.clone()))
                .collect(),
            slow: slow.iter().map(|address| address.to_string()).collect(),
        };

        let coordinator = SearchCoordinator::new(
            registry,
            Arc::new(transport),
            documents,
            Duration::from_millis(200),
        );

        (coordinator, substrate)
    }

    // ============================================================
    // TOKENIZER TESTS
    // ============================================================

    #[test]
    fn test_tokenize_splits_on_separators() {
        let tokens = tokenize("Hello, World! How-are you?today;fine:yes.");
        assert_eq!(
            tokens,
            strings(&["Hello", "World", "How", "are", "you", "today", "fine", "yes"])
        );
    }

    #[test]
    fn test_tokenize_drops_empty_tokens_and_keeps_case() {
        assert_eq!(tokenize("  ...Dog   CAT\n\tbird  "), strings(&["Dog", "CAT", "bird"]));
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ,.;: ").is_empty());
    }

    // ============================================================
    // SCORING TESTS
    // ============================================================

    #[test]
    fn test_term_frequency() {
        let tokens = strings(&["dog", "dog", "cat", "bird"]);

        assert_eq!(term_frequency(&tokens, "dog"), 0.5);
        assert_eq!(term_frequency(&tokens, "cat"), 0.25);
        assert_eq!(term_frequency(&tokens, "fish"), 0.0);
        assert_eq!(term_frequency(&tokens, "DOG"), 0.5, "Case is ignored");
        assert_eq!(term_frequency(&[], "dog"), 0.0);
    }

    #[test]
    fn test_document_data_has_entry_per_term() {
        let tokens = strings(&["cat", "dog"]);
        let data = document_data(&tokens, &strings(&["dog", "fish"]));

        assert_eq!(data.frequency("dog"), 0.5);
        assert_eq!(data.frequency("fish"), 0.0);
        assert_eq!(data.frequency("never-asked"), 0.0);
    }

    fn corpus(entries: Vec<(&str, Vec<(&str, f64)>)>) -> Corpus {
        let mut corpus = Corpus::new();
        for (document, frequencies) in entries {
            let mut data = DocumentData::new();
            for (term, frequency) in frequencies {
                data.put_term_frequency(term, frequency);
            }
            corpus.insert(document.to_string(), data);
        }
        corpus
    }

    #[test]
    fn test_idf_is_zero_when_term_everywhere_or_nowhere() {
        let everywhere = corpus(vec![("A", vec![("dog", 0.5)]), ("B", vec![("dog", 0.1)])]);
        assert_eq!(inverse_document_frequency("dog", &everywhere), 0.0);

        let nowhere = corpus(vec![("A", vec![("dog", 0.0)]), ("B", vec![("dog", 0.0)])]);
        assert_eq!(inverse_document_frequency("dog", &nowhere), 0.0);
        assert_eq!(inverse_document_frequency("cat", &nowhere), 0.0);
    }

    #[test]
    fn test_idf_counts_result_bearing_documents() {
        let corpus = corpus(vec![
            ("A", vec![("cat", 0.5), ("bird", 0.0)]),
            ("B", vec![("cat", 0.0), ("bird", 0.0)]),
            ("C", vec![("cat", 0.0), ("bird", 1.0)]),
        ]);

        // B holds no query term, so two documents bear results.
        assert!((inverse_document_frequency("cat", &corpus) - 2f64.log10()).abs() < 1e-12);
        assert!((inverse_document_frequency("bird", &corpus) - 2f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_score_sums_tf_times_idf() {
        let terms = strings(&["cat", "bird"]);
        let mut data = DocumentData::new();
        data.put_term_frequency("cat", 0.5);
        data.put_term_frequency("bird", 0.25);
        let idf = HashMap::from([("cat".to_string(), 2.0), ("bird".to_string(), 4.0)]);

        assert_eq!(score(&terms, &data, &idf), 2.0);
    }

    #[test]
    fn test_rank_descending_orders_groups() {
        let terms = strings(&["cat", "bird"]);
        let corpus = corpus(vec![
            ("A", vec![("cat", 0.5), ("bird", 0.0)]),
            ("B", vec![("cat", 1.0 / 3.0), ("bird", 0.0)]),
            ("C", vec![("cat", 0.0), ("bird", 1.0)]),
        ]);

        let groups = rank_descending(&corpus, &terms);
        let order: Vec<&str> = groups
            .iter()
            .flat_map(|g| g.documents.iter().map(|d| d.as_str()))
            .collect();

        assert_eq!(order, vec!["C", "A", "B"]);
        assert!(groups.windows(2).all(|w| w[0].score > w[1].score));
    }

    #[test]
    fn test_rank_descending_ties_keep_corpus_order() {
        let terms = strings(&["dog"]);
        let corpus = corpus(vec![
            ("Z", vec![("dog", 0.0)]),
            ("A", vec![("dog", 0.0)]),
            ("M", vec![("dog", 0.0)]),
        ]);

        let groups = rank_descending(&corpus, &terms);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].documents, strings(&["Z", "A", "M"]));
    }

    #[test]
    fn test_rank_descending_is_stable() {
        let terms = strings(&["cat", "dog"]);
        let corpus = corpus(vec![
            ("A", vec![("cat", 0.2), ("dog", 0.0)]),
            ("B", vec![("cat", 0.0), ("dog", 0.4)]),
            ("C", vec![("cat", 0.2), ("dog", 0.0)]),
            ("D", vec![("cat", 0.0), ("dog", 0.0)]),
        ]);

        assert_eq!(rank_descending(&corpus, &terms), rank_descending(&corpus, &terms));
    }

    // ============================================================
    // PARTITION TESTS
    // ============================================================

    #[test]
    fn test_partition_assigns_every_document_once_in_order() {
        for total in 1..=12usize {
            let documents: Vec<String> = (0..total).map(|i| format!("doc-{}", i)).collect();

            for workers in 1..=15 {
                let slices = split_documents(workers, &documents);

                assert!(slices.len() <= workers);
                assert!(slices.iter().all(|slice| !slice.is_empty()));
                assert_eq!(slices.concat(), documents);

                let per_worker = total.div_ceil(workers);
                let (last, full) = slices.split_last().unwrap();
                assert!(full.iter().all(|slice| slice.len() == per_worker));
                assert!(!last.is_empty() && last.len() <= per_worker);
            }
        }
    }

    #[test]
    fn test_partition_edge_cases() {
        assert!(split_documents(3, &[]).is_empty());
        assert!(split_documents(0, &strings(&["a"])).is_empty());
        assert_eq!(
            split_documents(4, &strings(&["a", "b", "c", "d", "e"])),
            vec![strings(&["a", "b"]), strings(&["c", "d"]), strings(&["e"])]
        );
    }

    // ============================================================
    // WORKER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_worker_computes_term_frequencies() {
        let worker = SearchWorker::new(animals());
        let result = worker
            .process_task(Task {
                search_terms: strings(&["dog"]),
                documents: strings(&["A", "B", "C"]),
            })
            .await;

        let ids: Vec<&String> = result.documents.keys().collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(result.documents["A"].frequency("dog"), 0.5);
        assert!((result.documents["B"].frequency("dog") - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.documents["C"].frequency("dog"), 0.0);
    }

    #[tokio::test]
    async fn test_worker_skips_unreadable_documents() {
        let worker = SearchWorker::new(animals());
        let result = worker
            .process_task(Task {
                search_terms: strings(&["cat"]),
                documents: strings(&["A", "missing"]),
            })
            .await;

        assert_eq!(result.documents.len(), 1);
        assert!(result.documents.contains_key("A"));
    }

    #[tokio::test]
    async fn test_worker_wire_format() {
        let worker = SearchWorker::new(animals());
        let payload = encode(&Task {
            search_terms: strings(&["bird"]),
            documents: strings(&["C"]),
        })
        .unwrap();

        let bytes = worker.handle_request(&payload).await.unwrap();
        let result: TaskResult = decode(&bytes).unwrap();
        assert_eq!(result.documents["C"].frequency("bird"), 1.0);

        assert!(matches!(
            worker.handle_request(b"garbage").await,
            Err(SearchError::MalformedRequest(_))
        ));
    }

    // ============================================================
    // COORDINATOR TESTS
    // ============================================================

    #[tokio::test]
    async fn test_single_worker_tied_scores_in_corpus_order() {
        let (coordinator, _substrate) =
            coordinator_with(&["worker-1"], &["worker-1"], &[], animals()).await;

        let report = coordinator.search("dog").await.unwrap();

        assert_eq!(report.tasks_sent, 1);
        assert_eq!(report.responses_received, 1);

        let ids: Vec<&str> = report.results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(report.results.iter().all(|r| r.score == 0.0));
    }

    #[tokio::test]
    async fn test_distinct_scores_rank_descending() {
        let (coordinator, _substrate) = coordinator_with(
            &["worker-1", "worker-2"],
            &["worker-1", "worker-2"],
            &[],
            animals(),
        )
        .await;

        let results = coordinator.handle_search("cat bird").await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);

        let a = &results[1];
        assert_eq!(a.document_name, "A");
        assert_eq!(a.document_size, "cat dog".len() as u64);
    }

    #[tokio::test]
    async fn test_partial_failure_uses_surviving_worker() {
        let (coordinator, _substrate) = coordinator_with(
            &["worker-ok", "worker-down"],
            &["worker-ok"],
            &[],
            animals(),
        )
        .await;

        let report = coordinator.search("dog").await.unwrap();

        assert_eq!(report.tasks_sent, 2);
        assert_eq!(report.responses_received, 1);
        let ids: Vec<&str> = report.results.iter().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_slow_worker_is_abandoned() {
        let (coordinator, _substrate) = coordinator_with(
            &["worker-fast", "worker-slow"],
            &["worker-fast", "worker-slow"],
            &["worker-slow"],
            animals(),
        )
        .await;

        let started = std::time::Instant::now();
        let report = coordinator.search("dog").await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.tasks_sent, 2);
        assert_eq!(report.responses_received, 1);
    }

    #[tokio::test]
    async fn test_no_workers_is_empty_success() {
        let (coordinator, _substrate) = coordinator_with(&[], &[], &[], animals()).await;

        let report = coordinator.search("dog").await.unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.tasks_sent, 0);
    }

    #[tokio::test]
    async fn test_empty_query_returns_every_document() {
        let (coordinator, _substrate) =
            coordinator_with(&["worker-1"], &["worker-1"], &[], animals()).await;

        let results = coordinator.handle_search("").await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[tokio::test]
    async fn test_more_workers_than_documents() {
        let (coordinator, _substrate) = coordinator_with(
            &["w1", "w2", "w3", "w4", "w5"],
            &["w1", "w2", "w3", "w4", "w5"],
            &[],
            animals(),
        )
        .await;

        let report = coordinator.search("dog").await.unwrap();
        assert_eq!(report.tasks_sent, 3);
        assert_eq!(report.responses_received, 3);
        assert_eq!(report.results.len(), 3);
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let substrate = MemoryCoordinator::new();
        let session = substrate.connect();
        let store = MembershipStore::new(Arc::new(session.clone()));
        let registry = ServiceRegistry::new(store, WORKERS_REGISTRY_NAMESPACE)
            .await
            .unwrap();
        let coordinator = SearchCoordinator::new(
            registry,
            Arc::new(LocalTransport {
                workers: HashMap::new(),
                slow: HashSet::new(),
            }),
            animals(),
            Duration::from_millis(200),
        );

        substrate.expire_session(session.session_id());

        assert!(matches!(
            coordinator.search("dog").await,
            Err(SearchError::MembershipUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_coordinator_wire_format() {
        let (coordinator, _substrate) =
            coordinator_with(&["worker-1"], &["worker-1"], &[], animals()).await;

        let payload = encode(&SearchRequest {
            search_query: "cat bird".to_string(),
        })
        .unwrap();
        let bytes = coordinator.handle_request(&payload).await.unwrap();
        let response: SearchResponse = decode(&bytes).unwrap();

        assert_eq!(response.relevant_documents.len(), 3);
        assert_eq!(response.relevant_documents[0].document_name, "C");
        assert_eq!(response.relevant_documents[0].document_size, 4);

        assert!(matches!(
            coordinator.handle_request(&[0xff]).await,
            Err(SearchError::MalformedRequest(_))
        ));
    }

    // ============================================================
    // DOCUMENT STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_fs_document_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second book").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let store = FsDocumentStore::new(dir.path());
        let documents = store.list_documents().await.unwrap();

        assert_eq!(documents.len(), 2, "Directories are not documents");
        assert!(documents[0].ends_with("a.txt"));
        assert!(documents[1].ends_with("b.txt"));

        assert_eq!(store.read_text(&documents[1]).await.unwrap(), "second book");

        let info = store.describe(&documents[0]).await.unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 5);

        assert!(store.describe("/definitely/not/here.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_fs_document_store_stays_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "root cat").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("deep.txt"), "root").unwrap();
        std::fs::write(outside.path().join("secret.txt"), "root root").unwrap();

        let store = FsDocumentStore::new(dir.path());
        let secret = outside.path().join("secret.txt");
        let escaping = dir
            .path()
            .join("..")
            .join(outside.path().file_name().unwrap())
            .join("secret.txt");
        let nested = dir.path().join("nested").join("deep.txt");

        for document in [&secret, &escaping, &nested] {
            let document = document.to_string_lossy();
            let read = store.read_text(&document).await.unwrap_err();
            assert_eq!(read.kind(), std::io::ErrorKind::NotFound, "{}", document);
            let described = store.describe(&document).await.unwrap_err();
            assert_eq!(described.kind(), std::io::ErrorKind::NotFound, "{}", document);
        }

        let worker = SearchWorker::new(Arc::new(store));
        let result = worker
            .process_task(Task {
                search_terms: strings(&["root"]),
                documents: vec![
                    secret.to_string_lossy().into_owned(),
                    dir.path().join("a.txt").to_string_lossy().into_owned(),
                ],
            })
            .await;

        assert_eq!(result.documents.len(), 1);
        let (document, data) = result.documents.get_index(0).unwrap();
        assert!(document.ends_with("a.txt"));
        assert_eq!(data.frequency("root"), 0.5);
    }
}
