//! Stage dispatch — walks the eligible set for one stage, sends the
//! reminder, and applies the resulting transition.

use std::time::Duration;

use chrono::Utc;

use rekindle_core::error::{Result, SendError};
use rekindle_core::traits::Courier;
use rekindle_store::UserStore;

use crate::lifecycle::{LifecycleState, Stage};

/// Aggregate outcome of one stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub sent: u32,
    pub failed: u32,
}

/// Run one warmup stage: fetch the eligible set, send to each recipient
/// sequentially with `pace` between attempts, and write back the
/// transition each outcome calls for.
///
/// Per-user failures are contained here and only show up in the report;
/// the one thing that aborts the batch is the store going away.
pub async fn run_stage(
    store: &UserStore,
    courier: &dyn Courier,
    stage: &Stage,
    pace: Duration,
) -> Result<StageReport> {
    let users = store.eligible_for_stage(stage.number, stage.after_hours, Utc::now())?;
    if users.is_empty() {
        return Ok(StageReport::default());
    }

    tracing::info!("{} users due for warmup #{}", users.len(), stage.number);

    let mut report = StageReport::default();
    for user in &users {
        // The query already selects on these rules; the state machine
        // stays the authority if the two ever drift.
        if !LifecycleState::of(user).can_advance_to(stage.number) {
            continue;
        }

        match courier.send_reminder(user.telegram_id, &stage.text).await {
            Ok(()) => {
                // The conditional update refuses the advance if the user
                // completed or got blocked while the send was in flight.
                let advanced = store.advance_stage(user.telegram_id, stage.number, Utc::now())?;
                report.sent += 1;
                if advanced {
                    tracing::info!("warmup #{} sent to {}", stage.number, user.telegram_id);
                } else {
                    tracing::debug!(
                        "warmup #{} delivered to {} but the record had already left stage {}",
                        stage.number,
                        user.telegram_id,
                        stage.number - 1
                    );
                }
            }
            Err(SendError::Unreachable) => {
                store.mark_blocked(user.telegram_id)?;
                report.failed += 1;
                tracing::info!("user {} blocked the bot", user.telegram_id);
            }
            Err(SendError::Transient(detail)) => {
                // Record untouched: the same stage is retried next tick.
                report.failed += 1;
                tracing::warn!(
                    "warmup #{} to {} failed: {detail}",
                    stage.number,
                    user.telegram_id
                );
            }
        }

        tokio::time::sleep(pace).await;
    }

    tracing::info!(
        "warmup #{} finished: {} sent, {} failed",
        stage.number,
        report.sent,
        report.failed
    );
    Ok(report)
}
