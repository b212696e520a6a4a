//! Participant data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row per distinct participant, keyed by Telegram id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Set once at first contact, never updated.
    pub registered_at: DateTime<Utc>,
    /// Becomes true exactly once, on the web-app entry event.
    pub has_completed: bool,
    /// Starts at 0; advances by exactly 1 per successful reminder.
    pub warmup_stage: u32,
    /// Timestamp of the most recent successful reminder.
    pub last_warmup_at: Option<DateTime<Utc>>,
    /// Becomes true exactly once, when Telegram reports the user gone.
    pub is_blocked: bool,
    /// Acquisition tag from the /start deep link; write-once.
    pub source: Option<String>,
}

impl UserRecord {
    /// Reference point for the next elapsed-time gate: the last reminder
    /// if one was sent, otherwise registration.
    pub fn warmup_anchor(&self) -> DateTime<Utc> {
        self.last_warmup_at.unwrap_or(self.registered_at)
    }
}

/// Profile metadata captured from an incoming contact. Carries no
/// lifecycle fields, so an upsert can never clobber warmup state.
#[derive(Debug, Clone, Default)]
pub struct UserMeta {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub source: Option<String>,
}

/// Aggregate counts for the /stats surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub blocked: u64,
}
