//! HTTP client for the Telegram Bot API
//!
//! Wraps reqwest::Client with the bot token and the `{ok, result}` response
//! envelope.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{ApiError, ReplyMode, Transport};
use crate::config::Config;
use crate::models::{ChatMember, Message, Update, User};

/// Timeout for ordinary (non long-poll) requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra time granted to getUpdates beyond its long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> Envelope<T> {
    fn into_result(self, method: &'static str) -> Result<T, ApiError> {
        if !self.ok {
            return Err(ApiError::Telegram {
                method,
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            });
        }
        self.result.ok_or(ApiError::MissingResult { method })
    }
}

/// Authenticated Bot API client.
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!(
                "{}/bot{}",
                config.api_base.as_str().trim_end_matches('/'),
                config.token
            ),
        }
    }

    /// POST a JSON body to `method` and unwrap the response envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        // The URL carries the token, so only the method name is logged.
        tracing::debug!("Bot API {}", method);
        let http_err = |e: reqwest::Error| ApiError::Http {
            method,
            source: e.without_url(),
        };

        let resp = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_err)?;

        // Error responses come with a non-2xx status but still carry the envelope.
        let envelope: Envelope<T> = resp.json().await.map_err(http_err)?;
        envelope.into_result(method)
    }

    /// Identity of the bot; also validates the token.
    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        reply_to: Option<i64>,
        text: &str,
        mode: ReplyMode,
    ) -> Result<Message, ApiError> {
        self.call(
            "sendMessage",
            &send_message_body(chat_id, reply_to, text, mode),
            REQUEST_TIMEOUT,
        )
        .await
    }
}

fn send_message_body(
    chat_id: i64,
    reply_to: Option<i64>,
    text: &str,
    mode: ReplyMode,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if let Some(id) = reply_to {
        body["reply_parameters"] = serde_json::json!({ "message_id": id });
    }
    match mode {
        ReplyMode::Plain => {}
        ReplyMode::Html => {
            body["parse_mode"] = "HTML".into();
        }
        ReplyMode::HtmlNoPreview => {
            body["parse_mode"] = "HTML".into();
            body["link_preview_options"] = serde_json::json!({ "is_disabled": true });
        }
    }
    body
}

impl Transport for TelegramClient {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, ApiError> {
        let mut body = serde_json::json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = offset.into();
        }
        self.call("getUpdates", &body, timeout + POLL_GRACE).await
    }

    async fn send_reply(&self, to: &Message, text: &str, mode: ReplyMode) -> Result<(), ApiError> {
        self.send_message(to.chat.id, Some(to.message_id), text, mode)
            .await
            .map(|_| ())
    }

    async fn get_chat_member(&self, chat_id: i64, user_id: i64) -> Result<ChatMember, ApiError> {
        self.call(
            "getChatMember",
            &serde_json::json!({ "chat_id": chat_id, "user_id": user_id }),
            REQUEST_TIMEOUT,
        )
        .await
    }
}
