//! # Rekindle Warmup
//!
//! The re-engagement engine. Participants who register but never finish
//! the entry flow are walked through a configured sequence of reminder
//! stages, each gated by an elapsed-time threshold from the previous
//! milestone.
//!
//! ## Architecture
//! ```text
//! WarmupScheduler (tokio interval, single task)
//!   └── each tick, stages in ascending order:
//!         run_stage
//!           ├── UserStore::eligible_for_stage   (time-windowed query)
//!           ├── Courier::send_reminder          (paced, sequential)
//!           └── advance_stage / mark_blocked    (atomic conditional writes)
//! ```

pub mod dispatch;
pub mod engine;
pub mod lifecycle;

pub use dispatch::{StageReport, run_stage};
pub use engine::{SchedulerHandle, WarmupScheduler};
pub use lifecycle::{LifecycleState, Stage, StagePlan};
