//! Error types for the image relay cache

use std::fmt;

/// Failures surfaced by the cache.
///
/// Payloads are plain strings so a single population outcome can be cloned
/// out to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Missing or malformed id/url
    InvalidInput(String),
    /// The origin could not be reached or did not return a usable image
    OriginUnavailable(String),
    /// The relay rejected or never received the upload
    RelayUpload(String),
    /// A stored relay reference could not be read back
    RelayDownload(String),
    /// The persistence layer failed
    Persistence(String),
    Internal(String),
}

impl CacheError {
    /// Stable discriminant for API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::InvalidInput(_) => "invalid_input",
            CacheError::OriginUnavailable(_) => "origin_unavailable",
            CacheError::RelayUpload(_) => "relay_upload",
            CacheError::RelayDownload(_) => "relay_download",
            CacheError::Persistence(_) => "persistence",
            CacheError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            CacheError::OriginUnavailable(msg) => write!(f, "Origin unavailable: {}", msg),
            CacheError::RelayUpload(msg) => write!(f, "Relay upload error: {}", msg),
            CacheError::RelayDownload(msg) => write!(f, "Relay download error: {}", msg),
            CacheError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            CacheError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
