//! Telegram Bot API HTTP client

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use moka::future::Cache;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Result, TelegramError};
use crate::types::{ApiResponse, File, Message};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
// Download links stay valid for at least an hour
const FILE_PATH_TTL: Duration = Duration::from_secs(50 * 60);
// Largest file the Bot API lets a bot download
const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Client for a single bot token
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
    max_download_bytes: u64,
    /// file_id -> file_path, so repeated downloads skip `getFile`
    file_paths: Cache<String, String>,
}

impl TelegramClient {
    pub const DEFAULT_API_URL: &'static str = "https://api.telegram.org";

    /// Create a client against the public Bot API
    pub fn new(bot_token: &str) -> Result<Self> {
        Self::with_api_url(Self::DEFAULT_API_URL, bot_token, DEFAULT_TIMEOUT)
    }

    /// Create a client against a custom Bot API server (self-hosted or a test double)
    pub fn with_api_url(api_url: &str, bot_token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let file_paths = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(FILE_PATH_TTL)
            .build();

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            file_paths,
        })
    }

    /// Refuse downloads larger than `max_bytes` (20 MiB by default)
    pub fn with_max_download_bytes(mut self, max_bytes: u64) -> Self {
        self.max_download_bytes = max_bytes;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    /// Upload a file to `chat_id` as a document, preserving the original bytes
    pub async fn send_document(
        &self,
        chat_id: &str,
        data: Bytes,
        file_name: &str,
        content_type: &str,
    ) -> Result<Message> {
        let size = data.len();
        let part = Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("disable_notification", "true")
            .part("document", part);

        debug!(chat_id, file_name, size, "Uploading document to Telegram");

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        let message: Message = Self::parse_envelope(response).await?;
        debug!(
            chat_id,
            message_id = message.message_id,
            "Uploaded document to Telegram"
        );
        Ok(message)
    }

    /// Resolve a file id to its downloadable path
    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        let url = format!(
            "{}?file_id={}",
            self.method_url("getFile"),
            urlencoding::encode(file_id)
        );

        let response = self.http.get(&url).send().await?;
        Self::parse_envelope(response).await
    }

    /// Download a file by the path returned from `getFile`
    pub async fn download_file(&self, file_path: &str) -> Result<Bytes> {
        let url = format!(
            "{}/file/bot{}/{}",
            self.api_url,
            self.bot_token,
            file_path.trim_start_matches('/')
        );

        let mut response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), file_path, "Telegram file download failed");
            return Err(TelegramError::Api {
                code: Some(i64::from(response.status().as_u16())),
                description: format!("file download returned status {}", response.status()),
            });
        }

        let limit = self.max_download_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(TelegramError::FileTooLarge { limit });
        }

        // Read incrementally so a body without Content-Length stays bounded
        let mut data = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if (data.len() + chunk.len()) as u64 > limit {
                warn!(file_path, limit, "Telegram file exceeds download limit");
                return Err(TelegramError::FileTooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }
        Ok(data.freeze())
    }

    /// Download a file by id, resolving (and caching) its path first
    pub async fn download_by_id(&self, file_id: &str) -> Result<Bytes> {
        let file_path = match self.file_paths.get(file_id).await {
            Some(path) => path,
            None => {
                let file = self.get_file(file_id).await?;
                let path = file
                    .file_path
                    .ok_or(TelegramError::MissingField("file_path"))?;
                self.file_paths
                    .insert(file_id.to_string(), path.clone())
                    .await;
                path
            }
        };

        match self.download_file(&file_path).await {
            Ok(data) => Ok(data),
            Err(e) => {
                // The cached path may have expired early; resolve again next time
                self.file_paths.invalidate(file_id).await;
                Err(e)
            }
        }
    }

    /// Decode the `{ok, result, error_code, description}` envelope
    async fn parse_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(TelegramError::Api {
                    code: Some(i64::from(status.as_u16())),
                    description: status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string(),
                })
            }
        };

        if !envelope.ok {
            return Err(TelegramError::Api {
                code: envelope.error_code,
                description: envelope
                    .description
                    .unwrap_or_else(|| "request failed".to_string()),
            });
        }

        envelope.result.ok_or(TelegramError::MissingField("result"))
    }
}
