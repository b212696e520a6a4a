//! Incoming command surface: /start, /help, /status, /stats, plus the
//! web-app completion event.

use std::sync::Arc;

use rekindle_channels::telegram::{TelegramChannel, TelegramMessage, TelegramUser};
use rekindle_core::config::RekindleConfig;
use rekindle_core::types::UserMeta;
use rekindle_store::UserStore;

pub struct Bot {
    store: Arc<UserStore>,
    channel: Arc<TelegramChannel>,
    config: RekindleConfig,
}

impl Bot {
    pub fn new(store: Arc<UserStore>, channel: Arc<TelegramChannel>, config: RekindleConfig) -> Self {
        Self {
            store,
            channel,
            config,
        }
    }

    /// Handle one incoming message; failures are logged, never fatal.
    pub async fn handle(&self, msg: TelegramMessage) {
        if let Err(e) = self.dispatch(msg).await {
            tracing::warn!("command handling failed: {e}");
        }
    }

    async fn dispatch(&self, msg: TelegramMessage) -> anyhow::Result<()> {
        let Some(from) = msg.from.clone() else {
            return Ok(());
        };
        let chat_id = msg.chat.id;

        if msg.web_app_data.is_some() {
            return self.on_completion(chat_id, from.id).await;
        }

        let Some(text) = msg.text.as_deref() else {
            return Ok(());
        };
        if let Some(rest) = text.strip_prefix("/start") {
            self.on_start(chat_id, &from, rest.trim()).await
        } else if text.starts_with("/help") {
            self.reply(chat_id, &self.config.messages.help, false).await
        } else if text.starts_with("/status") {
            self.on_status(chat_id, from.id).await
        } else if text.starts_with("/stats") {
            self.on_stats(chat_id, from.id).await
        } else {
            Ok(())
        }
    }

    /// First contact or a repeat /start: record the user, keep the deep
    /// link parameter as the acquisition tag, and point them at the entry
    /// button unless they are already in.
    async fn on_start(&self, chat_id: i64, from: &TelegramUser, source: &str) -> anyhow::Result<()> {
        let meta = UserMeta {
            username: from.username.clone(),
            first_name: from.first_name.clone(),
            last_name: from.last_name.clone(),
            source: (!source.is_empty()).then(|| source.to_string()),
        };
        self.store.upsert(from.id, &meta)?;

        let already_in = self.store.get(from.id)?.is_some_and(|u| u.has_completed);
        if already_in {
            self.reply(chat_id, &self.config.messages.already_in, false)
                .await?;
        } else {
            self.reply(chat_id, &self.config.messages.welcome, true)
                .await?;
        }
        tracing::info!(
            "user {} started (source: {})",
            from.id,
            if source.is_empty() { "direct" } else { source }
        );
        Ok(())
    }

    async fn on_status(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()> {
        let (text, with_keyboard) = match self.store.get(user_id)? {
            None => (
                "❌ You are not registered yet. Hit /start to join.".to_string(),
                false,
            ),
            Some(u) if u.has_completed => (
                format!(
                    "✅ *You are in the giveaway!*\n\n📅 Registered: {}",
                    u.registered_at.format("%Y-%m-%d")
                ),
                false,
            ),
            Some(_) => (
                "⚠️ *Registered, but not entered yet!*\n\nTap the button below to enter:"
                    .to_string(),
                true,
            ),
        };
        self.reply(chat_id, &text, with_keyboard).await
    }

    async fn on_stats(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()> {
        // Silently ignored for everyone but configured admins.
        if !self.config.admin_ids.contains(&user_id) {
            return Ok(());
        }

        let stats = self.store.stats()?;
        let conversion = if stats.total > 0 {
            stats.completed as f64 / stats.total as f64 * 100.0
        } else {
            0.0
        };
        let text = format!(
            "📊 *Bot stats*\n\n👥 Total: {}\n✅ Entered: {}\n⏳ Pending: {}\n🚫 Blocked: {}\n\n📈 Conversion: {conversion:.1}%",
            stats.total, stats.completed, stats.pending, stats.blocked
        );
        self.reply(chat_id, &text, false).await
    }

    /// The web app reported a finished entry: terminal for warmup.
    async fn on_completion(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()> {
        self.store.mark_completed(user_id)?;
        let text = self
            .config
            .messages
            .completed
            .replace("{number}", &entry_number(user_id));
        self.reply(chat_id, &text, false).await?;
        tracing::info!("user {user_id} completed the entry");
        Ok(())
    }

    async fn reply(&self, chat_id: i64, text: &str, with_keyboard: bool) -> anyhow::Result<()> {
        self.channel.send_message(chat_id, text, with_keyboard).await?;
        Ok(())
    }
}

/// Six-digit entry number shown to the user, derived from the Telegram id.
fn entry_number(user_id: i64) -> String {
    let digits = user_id.unsigned_abs().to_string();
    let tail = &digits[digits.len().saturating_sub(6)..];
    format!("{tail:0>6}")
}
