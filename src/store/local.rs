//! Directory-backed document store
//!
//! Each document is `<root>/<file id>.xlsx`; its revision is the SHA-256 of
//! the content.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::{DocumentMetadata, DocumentStore, StoreError, XLSX_MIME_TYPE};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

/// Compute SHA256 hash of content
fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_id: &str) -> PathBuf {
        self.root.join(format!("{}.xlsx", file_id))
    }

    /// Write a document without a revision check (used when creating it)
    pub async fn create(&self, file_id: &str, bytes: &[u8]) -> Result<DocumentMetadata, StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(file_id), bytes).await?;
        Ok(self.meta(file_id, bytes))
    }

    async fn read(&self, file_id: &str) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(self.path_for(file_id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(file_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn meta(&self, file_id: &str, bytes: &[u8]) -> DocumentMetadata {
        DocumentMetadata {
            id: file_id.to_string(),
            name: format!("{}.xlsx", file_id),
            mime_type: XLSX_MIME_TYPE.to_string(),
            revision: compute_hash(bytes),
        }
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn metadata(&self, file_id: &str) -> Result<DocumentMetadata, StoreError> {
        let bytes = self.read(file_id).await?;
        Ok(self.meta(file_id, &bytes))
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StoreError> {
        self.read(file_id).await
    }

    async fn export(&self, file_id: &str, _mime_type: &str) -> Result<Vec<u8>, StoreError> {
        self.read(file_id).await
    }

    async fn upload(
        &self,
        file_id: &str,
        bytes: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<DocumentMetadata, StoreError> {
        if let Some(expected) = expected_revision {
            let current = compute_hash(&self.read(file_id).await?);
            if current != expected {
                return Err(StoreError::RevisionMismatch {
                    file_id: file_id.to_string(),
                    expected: expected.to_string(),
                    actual: current,
                });
            }
        }

        // Write to a sibling file first so a failed write never truncates the register
        let path = self.path_for(file_id);
        let tmp = path.with_extension("xlsx.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(self.meta(file_id, &bytes))
    }
}
