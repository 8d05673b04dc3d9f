/// Splits `documents` into at most `worker_count` contiguous slices of
/// `ceil(len / worker_count)` documents. Slices are never empty, so fewer
/// slices than workers come back when there are fewer documents than workers.
pub fn split_documents(worker_count: usize, documents: &[String]) -> Vec<Vec<String>> {
    if worker_count == 0 || documents.is_empty() {
        return Vec::new();
    }

    let per_worker = documents.len().div_ceil(worker_count);
    documents
        .chunks(per_worker)
        .map(|chunk| chunk.to_vec())
        .collect()
}
