//! Per-user lifecycle state machine and the configured stage plan.

use rekindle_core::config::WarmupConfig;
use rekindle_core::types::UserRecord;

/// Where a record sits in the warmup lifecycle. `Completed` and `Blocked`
/// are terminal. An active record at the final configured stage simply has
/// no further stage to receive; it stays active until completion or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active { stage: u32 },
    Completed,
    Blocked,
}

impl LifecycleState {
    pub fn of(record: &UserRecord) -> Self {
        if record.has_completed {
            LifecycleState::Completed
        } else if record.is_blocked {
            LifecycleState::Blocked
        } else {
            LifecycleState::Active {
                stage: record.warmup_stage,
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, LifecycleState::Active { .. })
    }

    /// A successful reminder for stage N only ever moves N-1 to N.
    pub fn can_advance_to(self, next_stage: u32) -> bool {
        matches!(self, LifecycleState::Active { stage } if stage + 1 == next_stage)
    }
}

/// One reminder stage.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Ordinal in the sequence, starting at 1.
    pub number: u32,
    /// Minimum hours since the previous milestone.
    pub after_hours: u32,
    /// Message text sent with the call-to-action keyboard.
    pub text: String,
}

/// The configured reminder sequence, in ascending stage order.
#[derive(Debug, Clone)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn from_config(config: &WarmupConfig) -> Self {
        let stages = config
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| Stage {
                number: i as u32 + 1,
                after_hours: s.after_hours,
                text: s.text.clone(),
            })
            .collect();
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn max_stage(&self) -> u32 {
        self.stages.len() as u32
    }
}
