//! Error types for the Telegram Bot API client

use std::fmt;

/// Errors from the Telegram Bot API client
#[derive(Debug)]
pub enum TelegramError {
    /// Transport failure (connect, timeout, body read)
    Http(reqwest::Error),
    /// The Bot API answered with `ok: false` or a non-success status
    Api {
        code: Option<i64>,
        description: String,
    },
    /// Failed to parse a Bot API response body
    Json(serde_json::Error),
    /// The API call succeeded but a field the caller depends on was absent
    MissingField(&'static str),
    /// A downloaded file was larger than the configured limit
    FileTooLarge { limit: u64 },
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Telegram HTTP error: {e}"),
            Self::Api {
                code: Some(code),
                description,
            } => write!(f, "Telegram API error {code}: {description}"),
            Self::Api {
                code: None,
                description,
            } => write!(f, "Telegram API error: {description}"),
            Self::Json(e) => write!(f, "Telegram JSON parse error: {e}"),
            Self::MissingField(field) => write!(f, "Telegram response missing {field}"),
            Self::FileTooLarge { limit } => {
                write!(f, "Telegram file exceeds limit of {limit} bytes")
            }
        }
    }
}

impl std::error::Error for TelegramError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest embeds the request URL in its Display output, and Bot API
        // URLs carry the token.
        Self::Http(err.without_url())
    }
}

impl From<serde_json::Error> for TelegramError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_with_code() {
        let err = TelegramError::Api {
            code: Some(400),
            description: "Bad Request: chat not found".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Telegram API error 400: Bad Request: chat not found"
        );
    }

    #[test]
    fn test_api_error_display_without_code() {
        let err = TelegramError::Api {
            code: None,
            description: "unexpected".to_string(),
        };
        assert_eq!(format!("{}", err), "Telegram API error: unexpected");
    }

    #[test]
    fn test_missing_field_display() {
        let err = TelegramError::MissingField("file_path");
        assert_eq!(format!("{}", err), "Telegram response missing file_path");
    }
}
