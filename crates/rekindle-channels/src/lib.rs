//! # Rekindle Channels
//!
//! Messaging channel implementations. Currently Telegram Bot API only:
//! long polling for incoming commands, message sending with the giveaway
//! call-to-action keyboard.

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramConfig, TelegramMessage, TelegramUser};
