//! Cache key derivation

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Hex-encoded SHA-256 address of a cached image
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a logical id and origin URL.
    ///
    /// The URL is normalized first (scheme and host case, default ports) so
    /// spellings of the same resource share an entry. The id is length
    /// prefixed, so no `(id, url)` split can collide with another.
    pub fn derive(id: &str, url: &str) -> Result<Self> {
        let id = id.trim();
        let url = url.trim();

        if id.is_empty() {
            return Err(CacheError::InvalidInput("id is required".to_string()));
        }
        if url.is_empty() {
            return Err(CacheError::InvalidInput("url is required".to_string()));
        }

        let normalized = normalize_url(url);

        let mut hasher = Sha256::new();
        hasher.update((id.len() as u64).to_be_bytes());
        hasher.update(id.as_bytes());
        hasher.update(normalized.as_bytes());
        Ok(CacheKey(hex::encode(hasher.finalize())))
    }

    /// Accept a key read back from storage; anything but 64 hex chars is rejected
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(CacheKey(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => url.to_string(),
    }
}
