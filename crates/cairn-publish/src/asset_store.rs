//! Asset-store boundary: one HTTP POST carrying the raw bytes, answered
//! with the bare URI of the durably hosted copy.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("asset store returned an empty body (http status {status})")]
    EmptyResponse { status: u16 },
    #[error("asset store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid asset store endpoint '{endpoint}': {detail}")]
    InvalidEndpoint { endpoint: String, detail: String },
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub filename: String,
    /// Deterministic `session:path` seed; lets the store deduplicate
    /// repeated uploads of the same logical file within one session.
    pub content_seed: Option<String>,
}

/// Upload capability injected into the publish pipeline so the markdown
/// transform stays testable with a fake.
#[async_trait]
pub trait AssetUploader: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<String, AssetStoreError>;
}

pub struct HttpAssetStore {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAssetStore {
    pub fn new(endpoint: &str) -> Result<Self, AssetStoreError> {
        let trimmed = endpoint.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(AssetStoreError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                detail: "endpoint must be non-empty".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(AssetStoreError::Transport)?;
        Ok(Self {
            http,
            endpoint: trimmed.to_string(),
        })
    }
}

#[async_trait]
impl AssetUploader for HttpAssetStore {
    async fn upload(&self, request: UploadRequest) -> Result<String, AssetStoreError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_LENGTH, request.bytes.len())
            .header(reqwest::header::CONTENT_TYPE, request.mime.as_str())
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", request.filename),
            );
        if let Some(seed) = &request.content_seed {
            builder = builder.header("content-address-seed", seed.as_str());
        }
        let response = builder.body(request.bytes).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        let uri = body.trim();
        if uri.is_empty() {
            return Err(AssetStoreError::EmptyResponse { status });
        }
        Ok(uri.to_string())
    }
}
