//! Telegram Bot channel — long polling + message sending via Bot API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use rekindle_core::error::{RekindleError, Result, SendError, SendResult};
use rekindle_core::traits::Courier;

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// URL opened by the inline call-to-action button.
    pub webapp_url: String,
    /// Label on that button.
    pub button_text: String,
    /// Long-poll timeout passed to getUpdates.
    pub poll_timeout_secs: u64,
}

/// Telegram Bot API client. Immutable after construction, so one instance
/// is shared between the polling loop and the warmup dispatcher.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    /// Inline keyboard with the single web-app call-to-action button.
    fn action_keyboard(&self) -> serde_json::Value {
        serde_json::json!({
            "inline_keyboard": [[{
                "text": self.config.button_text,
                "web_app": { "url": self.config.webapp_url }
            }]]
        })
    }

    /// Send a Markdown message, optionally with the call-to-action
    /// keyboard. A 403 from the API means the recipient shut the door for
    /// good; everything else is worth retrying later.
    pub async fn send_message(&self, chat_id: i64, text: &str, with_keyboard: bool) -> SendResult {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        if with_keyboard {
            body["reply_markup"] = self.action_keyboard();
        }

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SendError::Transient(format!("invalid send response: {e}")))?;

        classify_send(&result)
    }

    /// Get updates using long polling. `offset` is one past the last
    /// update id already seen.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.config.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| RekindleError::Channel(format!("getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| RekindleError::Channel(format!("invalid Telegram response: {e}")))?;

        if !body.ok {
            return Err(RekindleError::Channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }
        Ok(body.result.unwrap_or_default())
    }

    /// Get bot info; doubles as the startup token check.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| RekindleError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| RekindleError::Channel(format!("invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| RekindleError::Channel("no bot info".into()))
    }

    /// Spawn the long-polling loop; yields incoming user messages until
    /// the receiver is dropped.
    pub fn start_polling(self: Arc<Self>) -> mpsc::UnboundedReceiver<TelegramMessage> {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut last_update_id = 0i64;
            tracing::info!("Telegram polling loop started");

            loop {
                match self.get_updates(last_update_id + 1).await {
                    Ok(updates) => {
                        for update in updates {
                            last_update_id = last_update_id.max(update.update_id);
                            let Some(msg) = update.message else { continue };
                            if msg.from.as_ref().is_some_and(|u| u.is_bot) {
                                continue;
                            }
                            if tx.send(msg).is_err() {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        rx
    }
}

#[async_trait]
impl Courier for TelegramChannel {
    async fn send_reminder(&self, chat_id: i64, text: &str) -> SendResult {
        // Reminders always carry the call-to-action button.
        self.send_message(chat_id, text, true).await
    }
}

/// Map an API reply onto the send-outcome taxonomy.
fn classify_send(resp: &TelegramApiResponse<serde_json::Value>) -> SendResult {
    if resp.ok {
        return Ok(());
    }
    match resp.error_code {
        // "Forbidden: bot was blocked by the user" and friends.
        Some(403) => Err(SendError::Unreachable),
        _ => Err(SendError::Transient(
            resp.description
                .clone()
                .unwrap_or_else(|| "unknown Telegram error".into()),
        )),
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    /// Present when the giveaway web app reports completion.
    pub web_app_data: Option<WebAppData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebAppData {
    pub data: String,
}
