//! Document store speaking a Drive-v3-style files API over HTTPS
//!
//! `GET  {base}/files/{id}?fields=...`           metadata
//! `GET  {base}/files/{id}?alt=media`            binary download
//! `GET  {base}/files/{id}/export?mimeType=...`  export of native documents
//! `PATCH {upload}/files/{id}?uploadType=media`  content replacement

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;

use super::{DocumentMetadata, DocumentStore, StoreError, XLSX_MIME_TYPE};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

const METADATA_FIELDS: &str = "id,name,mimeType,version";

pub struct HttpStore {
    client: Client,
    base_url: String,
    upload_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    #[serde(default)]
    name: String,
    mime_type: String,
    #[serde(default)]
    version: Option<String>,
}

impl From<FileResource> for DocumentMetadata {
    fn from(file: FileResource) -> Self {
        DocumentMetadata {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            revision: file.version.unwrap_or_default(),
        }
    }
}

/// Media uploads go to a sibling `/upload` root: `.../drive/v3` becomes `.../upload/drive/v3`
pub fn upload_url_for(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match base.find("/drive/") {
        Some(idx) => format!("{}/upload{}", &base[..idx], &base[idx..]),
        None => format!("{}/upload", base),
    }
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let upload_url = upload_url_for(&base_url);
        Self {
            client: Client::new(),
            base_url,
            upload_url,
            token,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, file_id: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(file_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn bytes(&self, file_id: &str, request: RequestBuilder) -> Result<Vec<u8>, StoreError> {
        let response = self.send(file_id, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn metadata(&self, file_id: &str) -> Result<DocumentMetadata, StoreError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        let request = self.client.get(&url).query(&[("fields", METADATA_FIELDS)]);
        let file: FileResource = self
            .send(file_id, request)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(file.into())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        self.bytes(file_id, self.client.get(&url).query(&[("alt", "media")]))
            .await
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!("{}/files/{}/export", self.base_url, file_id);
        self.bytes(file_id, self.client.get(&url).query(&[("mimeType", mime_type)]))
            .await
    }

    async fn upload(
        &self,
        file_id: &str,
        bytes: Vec<u8>,
        expected_revision: Option<&str>,
    ) -> Result<DocumentMetadata, StoreError> {
        // The files API has no conditional write, so compare versions first
        if let Some(expected) = expected_revision {
            let current = self.metadata(file_id).await?;
            if current.revision != expected {
                return Err(StoreError::RevisionMismatch {
                    file_id: file_id.to_string(),
                    expected: expected.to_string(),
                    actual: current.revision,
                });
            }
        }

        let url = format!("{}/files/{}", self.upload_url, file_id);
        let request = self
            .client
            .patch(&url)
            .query(&[("uploadType", "media"), ("fields", METADATA_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, XLSX_MIME_TYPE)
            .body(bytes);
        let file: FileResource = self
            .send(file_id, request)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(file.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_url_for_drive_root() {
        assert_eq!(
            upload_url_for("https://www.googleapis.com/drive/v3"),
            "https://www.googleapis.com/upload/drive/v3"
        );
        assert_eq!(
            upload_url_for("http://localhost:8080/api/"),
            "http://localhost:8080/api/upload"
        );
    }

    #[test]
    fn test_file_resource_to_metadata() {
        let file: FileResource = serde_json::from_str(
            r#"{"id":"abc","name":"Register","mimeType":"application/vnd.google-apps.spreadsheet","version":"42"}"#,
        )
        .unwrap();
        let meta = DocumentMetadata::from(file);
        assert_eq!(meta.revision, "42");
        assert_eq!(meta.mime_type, super::super::NATIVE_SPREADSHEET_MIME_TYPE);
    }
}
