//! `MessageTransport` over a Telegram-compatible Bot HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use narrator_core::ids::{ChatId, MessageId, UserId};
use narrator_core::transport::{Menu, MessageTransport, TransportError};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::AppError;

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Response envelope of every Bot API method.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<Parameters>,
}

#[derive(Debug, Deserialize)]
struct Parameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// HTTP transport to the chat platform.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Builds a transport for the bot `token` at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(api_url: &str, token: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build platform HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        private: bool,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Network(format!("malformed {method} response: {e}")))?;

        if envelope.ok {
            if let Some(result) = envelope.result {
                return Ok(result);
            }
        }
        let error = classify_failure(
            status,
            envelope.description.as_deref().unwrap_or_default(),
            envelope.parameters.and_then(|p| p.retry_after),
            private,
        );
        debug!(method, status, %error, "platform call failed");
        Err(error)
    }
}

/// Maps a failed Bot API call onto the transport error taxonomy.
#[must_use]
pub fn classify_failure(
    status: u16,
    description: &str,
    retry_after: Option<u64>,
    private: bool,
) -> TransportError {
    let lowered = description.to_lowercase();
    if status == 429 {
        return TransportError::Throttled {
            retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
        };
    }
    if lowered.contains("message is not modified") {
        return TransportError::NotModified;
    }
    if lowered.contains("message to edit not found")
        || lowered.contains("message to delete not found")
        || lowered.contains("message can't be edited")
        || lowered.contains("message can't be deleted")
    {
        return TransportError::MessageGone;
    }
    if private && (status == 403 || lowered.contains("chat not found")) {
        return TransportError::Unreachable;
    }
    TransportError::Rejected(format!("{status}: {description}"))
}

/// Renders a menu as an inline keyboard.
#[must_use]
pub fn reply_markup(menu: &Menu) -> Value {
    let rows: Vec<Vec<Value>> = menu
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|choice| json!({ "text": choice.label, "callback_data": choice.id }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl MessageTransport for HttpTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        menu: &Menu,
    ) -> Result<MessageId, TransportError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                &json!({ "chat_id": chat_id.0, "text": text, "reply_markup": reply_markup(menu) }),
                false,
            )
            .await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: &Menu,
    ) -> Result<(), TransportError> {
        self.call::<Value>(
            "editMessageText",
            &json!({
                "chat_id": chat_id.0,
                "message_id": message_id.0,
                "text": text,
                "reply_markup": reply_markup(menu),
            }),
            false,
        )
        .await
        .map(|_| ())
    }

    async fn edit_menu(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        menu: &Menu,
    ) -> Result<(), TransportError> {
        self.call::<Value>(
            "editMessageReplyMarkup",
            &json!({
                "chat_id": chat_id.0,
                "message_id": message_id.0,
                "reply_markup": reply_markup(menu),
            }),
            false,
        )
        .await
        .map(|_| ())
    }

    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        self.call::<Value>(
            "deleteMessage",
            &json!({ "chat_id": chat_id.0, "message_id": message_id.0 }),
            false,
        )
        .await
        .map(|_| ())
    }

    async fn pin_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        self.call::<Value>(
            "pinChatMessage",
            &json!({
                "chat_id": chat_id.0,
                "message_id": message_id.0,
                "disable_notification": true,
            }),
            false,
        )
        .await
        .map(|_| ())
    }

    async fn send_private(&self, user_id: UserId, text: &str) -> Result<(), TransportError> {
        self.call::<Value>(
            "sendMessage",
            &json!({ "chat_id": user_id.0, "text": text }),
            true,
        )
        .await
        .map(|_| ())
    }

    async fn answer_choice(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> Result<(), TransportError> {
        self.call::<Value>(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id, "text": text, "show_alert": alert }),
            false,
        )
        .await
        .map(|_| ())
    }
}
