//! Remote document store: whole-blob get/put with metadata lookup

pub mod http;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use http::HttpStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Mime type of a binary xlsx blob
pub const XLSX_MIME_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Mime type of a spreadsheet native to the document service (must be exported)
pub const NATIVE_SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Errors from a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document '{0}' not found")]
    NotFound(String),

    #[error("document '{file_id}' changed: expected revision {expected}, found {actual}")]
    RevisionMismatch {
        file_id: String,
        expected: String,
        actual: String,
    },

    #[error("document service request failed: {0}")]
    Request(String),

    #[error("document service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What the store knows about a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub mime_type: String,

    /// Opaque token that changes on every write
    pub revision: String,
}

/// Whole-document storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn metadata(&self, file_id: &str) -> Result<DocumentMetadata, StoreError>;

    /// Raw bytes of a binary document
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Convert a native document to `mime_type` and return the bytes
    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace the document's content
    ///
    /// With `expected_revision` set, the write fails with
    /// [`StoreError::RevisionMismatch`] when the stored revision differs.
    async fn upload(
        &self,
        file_id: &str,
        bytes: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<DocumentMetadata, StoreError>;
}

/// A fetched document with the revision it was read at
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub revision: String,
}

/// Client for the single register document
#[derive(Clone)]
pub struct DocumentClient {
    store: Arc<dyn DocumentStore>,
    file_id: String,
}

impl DocumentClient {
    pub fn new(store: Arc<dyn DocumentStore>, file_id: impl Into<String>) -> Self {
        Self {
            store,
            file_id: file_id.into(),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Fetch the document as xlsx bytes
    ///
    /// Native spreadsheets are exported; anything else is downloaded as-is.
    pub async fn fetch(&self) -> Result<FetchedDocument, StoreError> {
        let meta = self.store.metadata(&self.file_id).await?;
        let bytes = if meta.mime_type == NATIVE_SPREADSHEET_MIME_TYPE {
            tracing::debug!(file_id = %self.file_id, "exporting native spreadsheet as xlsx");
            self.store.export(&self.file_id, XLSX_MIME_TYPE).await?
        } else {
            self.store.download(&self.file_id).await?
        };
        tracing::debug!(
            file_id = %self.file_id,
            revision = %meta.revision,
            bytes = bytes.len(),
            "fetched document"
        );
        Ok(FetchedDocument {
            bytes,
            revision: meta.revision,
        })
    }

    /// Store new document bytes, returning the new revision
    pub async fn store(
        &self,
        bytes: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<String, StoreError> {
        let size = bytes.len();
        let meta = self
            .store
            .upload(&self.file_id, bytes, expected_revision)
            .await?;
        tracing::info!(
            file_id = %self.file_id,
            revision = %meta.revision,
            bytes = size,
            "uploaded document"
        );
        Ok(meta.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_exports_native_documents() {
        let store = Arc::new(MemoryStore::new());
        store.put_native("native", b"exported".to_vec()).await;
        store.put("binary", b"raw".to_vec()).await;

        let native = DocumentClient::new(store.clone(), "native").fetch().await.unwrap();
        assert_eq!(native.bytes, b"exported");
        assert_eq!(store.export_count(), 1);
        assert_eq!(store.download_count(), 0);

        let binary = DocumentClient::new(store.clone(), "binary").fetch().await.unwrap();
        assert_eq!(binary.bytes, b"raw");
        assert_eq!(store.download_count(), 1);
    }

    #[tokio::test]
    async fn test_store_returns_new_revision() {
        let store = Arc::new(MemoryStore::new());
        store.put("doc", b"v1".to_vec()).await;
        let client = DocumentClient::new(store.clone(), "doc");

        let first = client.fetch().await.unwrap();
        let revision = client.store(b"v2".to_vec(), Some(&first.revision)).await.unwrap();
        assert_ne!(revision, first.revision);

        let stale = client.store(b"v3".to_vec(), Some(&first.revision)).await;
        assert!(matches!(stale, Err(StoreError::RevisionMismatch { .. })));
    }
}
