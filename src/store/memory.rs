//! In-process document store, used by tests and dry runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{DocumentMetadata, DocumentStore, StoreError, NATIVE_SPREADSHEET_MIME_TYPE, XLSX_MIME_TYPE};

#[derive(Debug, Clone)]
struct StoredDocument {
    mime_type: String,
    bytes: Vec<u8>,
    version: u64,
}

/// Documents kept in memory with a version counter as revision
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
    downloads: AtomicUsize,
    exports: AtomicUsize,
    uploads: AtomicUsize,
    fail_uploads: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a binary xlsx document
    pub async fn put(&self, file_id: &str, bytes: Vec<u8>) {
        self.insert(file_id, XLSX_MIME_TYPE, bytes).await;
    }

    /// Add or replace a document that has to be exported to be read
    pub async fn put_native(&self, file_id: &str, bytes: Vec<u8>) {
        self.insert(file_id, NATIVE_SPREADSHEET_MIME_TYPE, bytes).await;
    }

    async fn insert(&self, file_id: &str, mime_type: &str, bytes: Vec<u8>) {
        let mut docs = self.documents.write().await;
        let version = docs.get(file_id).map(|d| d.version + 1).unwrap_or(1);
        docs.insert(
            file_id.to_string(),
            StoredDocument {
                mime_type: mime_type.to_string(),
                bytes,
                version,
            },
        );
    }

    /// Current bytes of a document
    pub async fn get(&self, file_id: &str) -> Option<Vec<u8>> {
        self.documents.read().await.get(file_id).map(|d| d.bytes.clone())
    }

    /// Drop a document; later reads of it fail with `NotFound`
    pub async fn remove(&self, file_id: &str) -> Option<Vec<u8>> {
        self.documents.write().await.remove(file_id).map(|d| d.bytes)
    }

    /// Make every following upload fail, or succeed again
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn export_count(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Downloads plus exports
    pub fn fetch_count(&self) -> usize {
        self.download_count() + self.export_count()
    }
}

fn metadata(file_id: &str, doc: &StoredDocument) -> DocumentMetadata {
    DocumentMetadata {
        id: file_id.to_string(),
        name: file_id.to_string(),
        mime_type: doc.mime_type.clone(),
        revision: doc.version.to_string(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn metadata(&self, file_id: &str) -> Result<DocumentMetadata, StoreError> {
        let docs = self.documents.read().await;
        let doc = docs
            .get(file_id)
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;
        Ok(metadata(file_id, doc))
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StoreError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.get(file_id)
            .await
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))
    }

    async fn export(&self, file_id: &str, _mime_type: &str) -> Result<Vec<u8>, StoreError> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        self.get(file_id)
            .await
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))
    }

    async fn upload(
        &self,
        file_id: &str,
        bytes: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<DocumentMetadata, StoreError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StoreError::Request("upload rejected".to_string()));
        }

        let mut docs = self.documents.write().await;
        let doc = docs
            .get_mut(file_id)
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;

        let current = doc.version.to_string();
        if let Some(expected) = expected_revision {
            if expected != current {
                return Err(StoreError::RevisionMismatch {
                    file_id: file_id.to_string(),
                    expected: expected.to_string(),
                    actual: current,
                });
            }
        }

        doc.bytes = bytes;
        doc.version += 1;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(metadata(file_id, doc))
    }
}
