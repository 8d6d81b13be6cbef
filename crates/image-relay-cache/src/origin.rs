//! Fetching original images from their upstream URL

use crate::error::{CacheError, Result};
use crate::types::OriginImage;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_BYTES: u64 = 20 * 1024 * 1024;
const USER_AGENT: &str = "image-relay-cache/0.1";

/// Retrieves image bytes from an origin; a single attempt, no retries
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<OriginImage>;
}

/// HTTP(S) origin fetcher
pub struct HttpOriginFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpOriginFetcher {
    /// Create a fetcher with a 30 second timeout and a 20 MiB body limit
    pub fn new() -> Result<Self> {
        Self::with_options(DEFAULT_TIMEOUT, DEFAULT_MAX_BYTES)
    }

    pub fn with_options(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl OriginFetcher for HttpOriginFetcher {
    async fn fetch(&self, url: &str) -> Result<OriginImage> {
        let parsed = Url::parse(url)
            .map_err(|e| CacheError::OriginUnavailable(format!("invalid url {url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CacheError::OriginUnavailable(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }

        debug!(url = %parsed, "Fetching image from origin");

        let response = self.client.get(parsed).send().await.map_err(|e| {
            warn!(url, error = %e, "Origin request failed");
            CacheError::OriginUnavailable(e.to_string())
        })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url, "Origin returned error status");
            return Err(CacheError::OriginUnavailable(format!(
                "origin returned status {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(CacheError::OriginUnavailable(format!(
                    "image is {length} bytes, limit is {}",
                    self.max_bytes
                )));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = read_capped(response, self.max_bytes).await.map_err(|e| {
            warn!(url, error = %e, "Failed to read origin body");
            e
        })?;

        debug!(
            size = data.len(),
            content_type = %content_type,
            "Fetched image from origin"
        );

        Ok(OriginImage { data, content_type })
    }
}

/// Read the body chunk by chunk, giving up as soon as it passes `max_bytes`
/// so an origin without a `Content-Length` cannot make us buffer unbounded
async fn read_capped(mut response: reqwest::Response, max_bytes: u64) -> Result<Bytes> {
    let mut data = BytesMut::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| CacheError::OriginUnavailable(e.to_string()))?
    {
        if (data.len() + chunk.len()) as u64 > max_bytes {
            return Err(CacheError::OriginUnavailable(format!(
                "image exceeds limit of {max_bytes} bytes"
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}
