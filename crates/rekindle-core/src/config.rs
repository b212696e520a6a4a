//! Rekindle configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RekindleError, Result};

/// Root configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RekindleConfig {
    /// Telegram bot token. Required; startup fails without it.
    #[serde(default)]
    pub bot_token: String,
    /// URL the call-to-action button opens.
    #[serde(default = "default_webapp_url")]
    pub webapp_url: String,
    /// Telegram ids allowed to run /stats.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub messages: Messages,
    #[serde(default)]
    pub warmup: WarmupConfig,
}

fn default_webapp_url() -> String {
    "https://example.com/giveaway".into()
}
fn default_db_path() -> String {
    "~/.rekindle/users.db".into()
}

impl Default for RekindleConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            webapp_url: default_webapp_url(),
            admin_ids: Vec::new(),
            db_path: default_db_path(),
            messages: Messages::default(),
            warmup: WarmupConfig::default(),
        }
    }
}

impl RekindleConfig {
    /// Load config from the default path (~/.rekindle/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RekindleError::Config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RekindleError::Config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Check the invariants that make the bot runnable.
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.is_empty() {
            return Err(RekindleError::Config("bot_token is not set".into()));
        }
        if self.warmup.stages.is_empty() {
            return Err(RekindleError::Config("no warmup stages configured".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rekindle")
            .join("config.toml")
    }
}

/// Texts for the command surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_already_in")]
    pub already_in: String,
    #[serde(default = "default_help")]
    pub help: String,
    /// Completion confirmation; `{number}` is replaced by the participant
    /// number derived from the Telegram id.
    #[serde(default = "default_completed")]
    pub completed: String,
    /// Label on the call-to-action button.
    #[serde(default = "default_button")]
    pub button: String,
}

fn default_welcome() -> String {
    "🎁 *Welcome!*\n\nTap the button below to enter the giveaway:".into()
}
fn default_already_in() -> String {
    "✅ You are already in the giveaway. Good luck!".into()
}
fn default_help() -> String {
    "Commands:\n/start — register and enter\n/status — check your entry\n/help — this message".into()
}
fn default_completed() -> String {
    "🎉 *Congratulations!*\n\nYou are in. Your entry number: *#{number}*\n\n🍀 Good luck!".into()
}
fn default_button() -> String {
    "🎰 Enter the giveaway".into()
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            already_in: default_already_in(),
            help: default_help(),
            completed: default_completed(),
            button: default_button(),
        }
    }
}

/// Warmup engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupConfig {
    /// Seconds between scheduler passes.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Milliseconds between successive sends within one pass, to stay
    /// under the Bot API rate limit.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
    /// Reminder stages in order; index 0 is stage 1.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
}

fn default_tick_secs() -> u64 {
    300
}
fn default_pace_ms() -> u64 {
    50
}
fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig {
            after_hours: 1,
            text: "👋 Still thinking it over? The giveaway is one tap away:".into(),
        },
        StageConfig {
            after_hours: 24,
            text: "⏰ A day already! Entries are still open — don't miss yours:".into(),
        },
        StageConfig {
            after_hours: 72,
            text: "🔥 Last call! The draw is close, grab your spot now:".into(),
        },
    ]
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            pace_ms: default_pace_ms(),
            stages: default_stages(),
        }
    }
}

/// One reminder stage: elapsed-hours gate plus the message to send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub after_hours: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RekindleConfig::default();
        assert_eq!(config.warmup.tick_secs, 300);
        assert_eq!(config.warmup.pace_ms, 50);
        assert_eq!(config.warmup.stages.len(), 3);
        assert_eq!(config.warmup.stages[0].after_hours, 1);
        assert_eq!(config.warmup.stages[2].after_hours, 72);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            bot_token = "123:abc"
            webapp_url = "https://giveaway.test/app"
            admin_ids = [42]

            [warmup]
            tick_secs = 60

            [[warmup.stages]]
            after_hours = 2
            text = "hey"
        "#;

        let config: RekindleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.admin_ids, vec![42]);
        assert_eq!(config.warmup.tick_secs, 60);
        assert_eq!(config.warmup.stages.len(), 1);
        assert_eq!(config.warmup.stages[0].text, "hey");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: RekindleConfig = toml::from_str("").unwrap();
        assert_eq!(config.warmup.stages.len(), 3);
        assert!(!config.messages.welcome.is_empty());
    }

    #[test]
    fn test_validate_requires_token() {
        let config = RekindleConfig::default();
        assert!(matches!(
            config.validate(),
            Err(crate::error::RekindleError::Config(_))
        ));
    }
}
