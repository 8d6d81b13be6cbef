//! External relay tier: images copied into a Telegram bot chat

use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::types::RelayReference;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use telegram_bot_relay::TelegramClient;
use tracing::{debug, warn};

/// Durable blob storage behind the relay cache
#[async_trait]
pub trait RelayUploader: Send + Sync {
    /// Whether the credentials the relay needs are present
    fn is_configured(&self) -> bool;

    async fn upload(&self, data: Bytes, content_type: &str, file_name: &str)
        -> Result<RelayReference>;

    async fn download(&self, reference: &RelayReference) -> Result<Bytes>;
}

/// Credentials and endpoint for [`TelegramRelay`]
#[derive(Debug, Clone)]
pub struct TelegramRelayConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
    /// Largest file `download` will read back
    pub max_file_bytes: u64,
}

impl Default for TelegramRelayConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_url: TelegramClient::DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Relay that stores each image as a document message in one chat
pub struct TelegramRelay {
    client: Option<TelegramClient>,
    chat_id: Option<String>,
}

impl TelegramRelay {
    /// Build the relay. Missing credentials are allowed: the relay then
    /// reports itself unconfigured and every transfer fails.
    pub fn new(config: TelegramRelayConfig) -> Result<Self> {
        let bot_token = config.bot_token.filter(|t| !t.trim().is_empty());
        let chat_id = config.chat_id.filter(|c| !c.trim().is_empty());

        let client = bot_token
            .map(|token| {
                TelegramClient::with_api_url(&config.api_url, &token, config.timeout)
                    .map(|client| client.with_max_download_bytes(config.max_file_bytes))
            })
            .transpose()
            .map_err(|e| CacheError::Internal(format!("failed to build Telegram client: {e}")))?;

        Ok(Self { client, chat_id })
    }

    fn client(&self) -> Option<&TelegramClient> {
        self.client.as_ref()
    }
}

#[async_trait]
impl RelayUploader for TelegramRelay {
    fn is_configured(&self) -> bool {
        self.client.is_some() && self.chat_id.is_some()
    }

    async fn upload(
        &self,
        data: Bytes,
        content_type: &str,
        file_name: &str,
    ) -> Result<RelayReference> {
        let (Some(client), Some(chat_id)) = (self.client(), self.chat_id.as_deref()) else {
            return Err(CacheError::RelayUpload(
                "Telegram bot token or chat id not configured".to_string(),
            ));
        };

        let message = client
            .send_document(chat_id, data, file_name, content_type)
            .await
            .map_err(|e| {
                warn!(file_name, error = %e, "Telegram upload failed");
                CacheError::RelayUpload(e.to_string())
            })?;

        // Telegram may file small images as photos; keep the largest size
        let (file_id, file_unique_id) = match (message.document, message.photo) {
            (Some(document), _) => (document.file_id, document.file_unique_id),
            (None, Some(photos)) => {
                let largest = photos
                    .into_iter()
                    .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
                    .ok_or_else(|| {
                        CacheError::RelayUpload("Telegram returned no photo sizes".to_string())
                    })?;
                (largest.file_id, largest.file_unique_id)
            }
            (None, None) => {
                return Err(CacheError::RelayUpload(
                    "Telegram message carries no file".to_string(),
                ))
            }
        };

        debug!(file_name, message_id = message.message_id, "Relayed image to Telegram");

        Ok(RelayReference {
            file_id,
            file_unique_id,
            message_id: message.message_id,
            chat_id: message.chat.id,
        })
    }

    async fn download(&self, reference: &RelayReference) -> Result<Bytes> {
        let Some(client) = self.client() else {
            return Err(CacheError::RelayDownload(
                "Telegram bot token not configured".to_string(),
            ));
        };

        client
            .download_by_id(&reference.file_id)
            .await
            .map_err(|e| {
                warn!(file_id = %reference.file_id, error = %e, "Telegram download failed");
                CacheError::RelayDownload(e.to_string())
            })
    }
}

/// File name used for an uploaded image, e.g. `<key>.jpg`
pub fn relay_file_name(key: &CacheKey, content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        _ => "bin",
    };

    format!("{}.{}", key, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_fake_bot_api(send_document_reply: serde_json::Value) -> String {
        let router = Router::new()
            .route(
                "/bottoken/sendDocument",
                post(move || {
                    let reply = send_document_reply.clone();
                    async move { Json(reply) }
                }),
            )
            .route(
                "/bottoken/getFile",
                get(|| async {
                    Json(json!({
                        "ok": true,
                        "result": {
                            "file_id": "file-1",
                            "file_unique_id": "uniq-1",
                            "file_path": "documents/file_1.jpg"
                        }
                    }))
                }),
            )
            .route(
                "/file/bottoken/documents/file_1.jpg",
                get(|| async { vec![0xFFu8, 0xD8] }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(api_url: String) -> TelegramRelayConfig {
        TelegramRelayConfig {
            bot_token: Some("token".to_string()),
            chat_id: Some("-100500".to_string()),
            api_url,
            ..Default::default()
        }
    }

    #[test]
    fn test_unconfigured_relay() {
        let relay = TelegramRelay::new(TelegramRelayConfig::default()).unwrap();
        assert!(!relay.is_configured());

        let relay = TelegramRelay::new(TelegramRelayConfig {
            bot_token: Some("token".to_string()),
            chat_id: Some("  ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(!relay.is_configured());
    }

    #[tokio::test]
    async fn test_upload_without_credentials_fails() {
        let relay = TelegramRelay::new(TelegramRelayConfig::default()).unwrap();
        let err = relay
            .upload(Bytes::from_static(b"x"), "image/jpeg", "a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::RelayUpload(_)));
    }

    #[tokio::test]
    async fn test_upload_and_download_document() {
        let api_url = spawn_fake_bot_api(json!({
            "ok": true,
            "result": {
                "message_id": 9,
                "chat": {"id": -100500},
                "date": 1700000000,
                "document": {"file_id": "file-1", "file_unique_id": "uniq-1"}
            }
        }))
        .await;
        let relay = TelegramRelay::new(config(api_url)).unwrap();
        assert!(relay.is_configured());

        let reference = relay
            .upload(Bytes::from_static(b"\xFF\xD8"), "image/jpeg", "a.jpg")
            .await
            .unwrap();
        assert_eq!(reference.file_id, "file-1");
        assert_eq!(reference.message_id, 9);
        assert_eq!(reference.chat_id, -100500);

        let data = relay.download(&reference).await.unwrap();
        assert_eq!(&data[..], b"\xFF\xD8");
    }

    #[tokio::test]
    async fn test_upload_picks_largest_photo() {
        let api_url = spawn_fake_bot_api(json!({
            "ok": true,
            "result": {
                "message_id": 10,
                "chat": {"id": -100500},
                "date": 1700000000,
                "photo": [
                    {"file_id": "small", "file_unique_id": "s", "width": 90, "height": 60},
                    {"file_id": "large", "file_unique_id": "l", "width": 900, "height": 600}
                ]
            }
        }))
        .await;
        let relay = TelegramRelay::new(config(api_url)).unwrap();

        let reference = relay
            .upload(Bytes::from_static(b"x"), "image/jpeg", "a.jpg")
            .await
            .unwrap();
        assert_eq!(reference.file_id, "large");
    }

    #[tokio::test]
    async fn test_upload_rejected_by_api() {
        let api_url = spawn_fake_bot_api(json!({
            "ok": false,
            "error_code": 413,
            "description": "Request Entity Too Large"
        }))
        .await;
        let relay = TelegramRelay::new(config(api_url)).unwrap();

        let err = relay
            .upload(Bytes::from_static(b"x"), "image/jpeg", "a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::RelayUpload(ref msg) if msg.contains("Too Large")));
    }

    #[test]
    fn test_relay_file_name() {
        let key = CacheKey::derive("42", "https://x/img.jpg").unwrap();
        assert_eq!(relay_file_name(&key, "image/jpeg"), format!("{key}.jpg"));
        assert_eq!(
            relay_file_name(&key, "image/PNG; charset=binary"),
            format!("{key}.png")
        );
        assert_eq!(
            relay_file_name(&key, "application/octet-stream"),
            format!("{key}.bin")
        );
    }
}
