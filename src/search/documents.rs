use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: String,
    pub size: u64,
}

/// The collection of documents searched by the cluster. Identifiers are
/// stable and globally unique (file paths for the file-system store).
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn list_documents(&self) -> io::Result<Vec<String>>;

    async fn read_text(&self, document: &str) -> io::Result<String>;

    async fn describe(&self, document: &str) -> io::Result<DocumentInfo>;
}

/// Every regular file directly inside one directory, in path order.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path of `document`, provided it is a file directly inside
    /// the root. Anything else is reported as missing.
    async fn resolve(&self, document: &str) -> io::Result<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let path = tokio::fs::canonicalize(document)
            .await
            .map_err(|_| outside_root(document))?;

        if path.parent() != Some(root.as_path()) {
            tracing::warn!("Rejected document outside {}: {}", root.display(), document);
            return Err(outside_root(document));
        }

        Ok(path)
    }
}

fn outside_root(document: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such document {}", document),
    )
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list_documents(&self) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                documents.push(entry.path().to_string_lossy().into_owned());
            }
        }

        documents.sort();
        Ok(documents)
    }

    async fn read_text(&self, document: &str) -> io::Result<String> {
        let path = self.resolve(document).await?;
        let bytes = tokio::fs::read(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn describe(&self, document: &str) -> io::Result<DocumentInfo> {
        let path = self.resolve(document).await?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(outside_root(document));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.to_string());

        Ok(DocumentInfo {
            name,
            size: metadata.len(),
        })
    }
}

/// Documents held in memory, listed in insertion order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<IndexMap<String, String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, id: &str, text: &str) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&self, id: &str, text: &str) {
        self.documents
            .write()
            .insert(id.to_string(), text.to_string());
    }

    fn missing(document: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("unknown document {}", document),
        )
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_documents(&self) -> io::Result<Vec<String>> {
        Ok(self.documents.read().keys().cloned().collect())
    }

    async fn read_text(&self, document: &str) -> io::Result<String> {
        self.documents
            .read()
            .get(document)
            .cloned()
            .ok_or_else(|| Self::missing(document))
    }

    async fn describe(&self, document: &str) -> io::Result<DocumentInfo> {
        self.documents
            .read()
            .get(document)
            .map(|text| DocumentInfo {
                name: document.to_string(),
                size: text.len() as u64,
            })
            .ok_or_else(|| Self::missing(document))
    }
}
