//! Durable file storage client.
//!
//! Copies a registry document into the storage service: the source file is
//! downloaded, then `PUT` to `{base}/files/{folder}/{file_name}`. The service
//! answers with the shareable link.

use async_trait::async_trait;
use docketwatch_core::{CollabError, UploadRequest, Uploaded, Uploader};
use serde::Deserialize;
use tracing::info;

use crate::http::{HttpSettings, SyncError, ensure_success};

pub struct StorageClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    link: String,
}

impl StorageClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, SyncError> {
        Ok(Self {
            client: settings.client()?,
            base_url: settings.trimmed_base(),
            token: settings.token.clone(),
        })
    }

    pub async fn copy_from(
        &self,
        source_url: &str,
        folder: &str,
        file_name: &str,
    ) -> Result<String, SyncError> {
        let source = ensure_success(self.client.get(source_url).send().await?).await?;
        let content_type = source
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/pdf")
            .to_string();
        let bytes = source.bytes().await?;

        let url = format!("{}/files/{}/{}", self.base_url, folder, file_name);
        info!(url = %url, size = bytes.len(), "uploading document");
        let mut req = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = ensure_success(req.send().await?).await?;
        let body: UploadResponse = serde_json::from_str(&resp.text().await?)?;
        Ok(body.link)
    }
}

#[async_trait]
impl Uploader for StorageClient {
    async fn upload(&self, request: &UploadRequest<'_>) -> Result<Uploaded, CollabError> {
        let link = self
            .copy_from(
                &request.document.link,
                &request.matter.application_number,
                &request.file_name,
            )
            .await?;
        Ok(Uploaded { link })
    }
}
