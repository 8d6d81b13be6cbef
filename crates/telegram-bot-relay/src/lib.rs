//! Telegram Bot API relay client
//!
//! A small client for the part of the Telegram Bot API that lets a bot chat
//! act as durable blob storage: files are uploaded with `sendDocument` and
//! read back through `getFile` and the file download endpoint.
//!
//! # Example
//!
//! ```no_run
//! use telegram_bot_relay::TelegramClient;
//!
//! # async fn example() -> Result<(), telegram_bot_relay::TelegramError> {
//! let client = TelegramClient::new("123456:ABC-DEF")?;
//!
//! let message = client
//!     .send_document("-1001234567890", b"hello".to_vec().into(), "hello.txt", "text/plain")
//!     .await?;
//! if let Some(document) = message.document {
//!     let data = client.download_by_id(&document.file_id).await?;
//!     assert_eq!(&data[..], b"hello");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use client::TelegramClient;
pub use error::{Result, TelegramError};
pub use types::{ApiResponse, Chat, Document, File, Message, PhotoSize};
