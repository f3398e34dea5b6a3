use std::time::Duration;

use async_trait::async_trait;
use fileclip_core::{FetchError, FileMetadata};
use reqwest::Client;
use url::Url;

/// Looks up what the upload service knows about a remote file.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// One round trip, no retries and no caching.
    async fn fetch(&self, reference: &str) -> Result<FileMetadata, FetchError>;
}

/// The metadata endpoint for `reference`: its URL with a trailing
/// `metadata` path segment. Query strings are kept.
pub fn metadata_url(reference: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(reference.trim())
        .map_err(|e| FetchError::InvalidReference(format!("{reference}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidReference(format!(
            "{reference}: unsupported scheme {}",
            url.scheme()
        )));
    }
    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidReference(reference.to_string()))?
        .pop_if_empty()
        .push("metadata");
    Ok(url)
}

/// reqwest-backed fetcher for `GET <reference>/metadata`.
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    client: Client,
}

impl Default for HttpMetadataFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpMetadataFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unreachable(format!("build client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, reference: &str) -> Result<FileMetadata, FetchError> {
        let url = metadata_url(reference)?;
        tracing::debug!("fetching metadata from {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Unreachable(format!("read body: {e}")))?;
        FileMetadata::parse(&body)
    }
}
