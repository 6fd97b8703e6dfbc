//! Telegram Bot API access
//!
//! The bot logic only needs to poll for updates, reply to a message and look
//! up a chat member; [`Transport`] is that seam, and
//! [`client::TelegramClient`] implements it over HTTPS.

pub mod client;

use std::time::Duration;

use crate::models::{ChatMember, Message, Update};

pub use client::TelegramClient;

/// How a reply's text is rendered by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Plain,
    Html,
    /// HTML with link previews disabled
    HtmlNoPreview,
}

/// Errors returned by the Bot API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} failed with {code}: {description}")]
    Telegram {
        method: &'static str,
        code: i64,
        description: String,
    },
    #[error("{method} returned ok without a result")]
    MissingResult { method: &'static str },
}

/// Operations the bot performs against the chat platform
pub trait Transport {
    /// Long-poll for updates with ids >= `offset`.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, ApiError>;

    /// Reply to `to` in its chat.
    async fn send_reply(&self, to: &Message, text: &str, mode: ReplyMode) -> Result<(), ApiError>;

    /// Look up a user's profile and membership status in a chat.
    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, ApiError>;
}
