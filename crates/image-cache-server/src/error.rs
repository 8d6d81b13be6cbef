//! Error types for the image cache server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use image_relay_cache::CacheError;
use serde::Serialize;
use std::fmt;

/// Startup failures
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Cache(CacheError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Cache(err) => write!(f, "Cache error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Cache(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<CacheError> for ServerError {
    fn from(err: CacheError) -> Self {
        ServerError::Cache(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Route failure, rendered as `{"error": ..., "kind": ...}`
#[derive(Debug)]
pub struct ApiError(pub CacheError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl ApiError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ApiError(CacheError::InvalidInput(msg.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            CacheError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        }

        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ServerError::Config("missing CACHE_DIR".to_string());
        assert_eq!(format!("{}", err), "Configuration error: missing CACHE_DIR");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::invalid_input("url is required").status(),
            StatusCode::BAD_REQUEST
        );
        for err in [
            CacheError::OriginUnavailable("timeout".to_string()),
            CacheError::RelayUpload("401".to_string()),
            CacheError::RelayDownload("404".to_string()),
            CacheError::Persistence("disk full".to_string()),
            CacheError::Internal("panic".to_string()),
        ] {
            assert_eq!(ApiError(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::invalid_input("id is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "invalid_input");
        assert_eq!(json["error"], "Invalid input: id is required");
    }
}
