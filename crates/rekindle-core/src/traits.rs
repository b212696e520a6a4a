//! Seams between the warmup engine and its collaborators.

use async_trait::async_trait;

use crate::error::SendResult;

/// Outbound message primitive the warmup dispatcher sends through.
/// Implemented by the Telegram channel; tests substitute scripted doubles.
#[async_trait]
pub trait Courier: Send + Sync {
    async fn send_reminder(&self, chat_id: i64, text: &str) -> SendResult;
}
