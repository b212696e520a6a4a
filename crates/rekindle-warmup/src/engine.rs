//! The recurring warmup pass: a single tokio task that, every tick, runs
//! each configured stage in ascending order against the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use rekindle_core::traits::Courier;
use rekindle_store::UserStore;

use crate::dispatch::run_stage;
use crate::lifecycle::StagePlan;

pub struct WarmupScheduler {
    store: Arc<UserStore>,
    courier: Arc<dyn Courier>,
    plan: StagePlan,
    tick: Duration,
    pace: Duration,
}

/// Handle to a running scheduler. Dropping it does not stop the loop;
/// call [`SchedulerHandle::stop`].
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for an in-flight pass to wind
    /// down. Every per-user update is atomic, so stopping mid-pass leaves
    /// no half-written record either way.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

impl WarmupScheduler {
    pub fn new(
        store: Arc<UserStore>,
        courier: Arc<dyn Courier>,
        plan: StagePlan,
        tick: Duration,
        pace: Duration,
    ) -> Self {
        Self {
            store,
            courier,
            plan,
            tick,
            pace,
        }
    }

    /// Spawn the recurring loop. One task owns the whole pass, so two
    /// ticks can never run concurrently; a pass that overruns its interval
    /// delays the next tick instead of stacking a second pass on top.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            tracing::info!(
                "warmup scheduler started: {} stages, tick every {}s",
                self.plan.max_stage(),
                self.tick.as_secs()
            );

            let mut interval = tokio::time::interval(self.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it so
            // the first pass runs a full period after startup.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => self.run_pass().await,
                    _ = stop_rx.changed() => {
                        tracing::info!("warmup scheduler stopping");
                        return;
                    }
                }
            }
        });
        SchedulerHandle { stop_tx, task }
    }

    /// One full pass. Stages run low-to-high so a user freshly advanced to
    /// stage N-1 in this pass is never also picked up for stage N+1; each
    /// stage failure is logged and the rest of the pass continues.
    async fn run_pass(&self) {
        tracing::debug!("checking for users due a warmup reminder");
        for stage in self.plan.stages() {
            if let Err(e) = run_stage(&self.store, self.courier.as_ref(), stage, self.pace).await {
                tracing::error!("warmup stage #{} aborted: {e}", stage.number);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rekindle_core::config::{StageConfig, WarmupConfig};
    use rekindle_core::error::SendResult;
    use rekindle_core::types::UserMeta;
    use std::sync::Mutex;

    struct CountingCourier {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Courier for CountingCourier {
        async fn send_reminder(&self, chat_id: i64, text: &str) -> SendResult {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn plan(stage_texts: &[&str]) -> StagePlan {
        StagePlan::from_config(&WarmupConfig {
            tick_secs: 1,
            pace_ms: 0,
            stages: stage_texts
                .iter()
                .map(|t| StageConfig {
                    after_hours: 0,
                    text: (*t).to_string(),
                })
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_pass_runs_stages_in_ascending_order() {
        let dir = std::env::temp_dir().join("rekindle-engine-order");
        std::fs::remove_dir_all(&dir).ok();
        let store = Arc::new(UserStore::open(&dir.join("users.db")).unwrap());
        store.upsert(1, &UserMeta::default()).unwrap();

        let courier = Arc::new(CountingCourier {
            sent: Mutex::new(Vec::new()),
        });
        let scheduler = WarmupScheduler::new(
            store.clone(),
            courier.clone(),
            plan(&["first", "second"]),
            Duration::from_secs(1),
            Duration::ZERO,
        );

        // Drive a pass directly; the user advances through both zero-gated
        // stages within it, low stage first.
        scheduler.run_pass().await;
        let sent = courier.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![(1, "first".to_string()), (1, "second".to_string())]
        );
        assert_eq!(store.get(1).unwrap().unwrap().warmup_stage, 2);

        // A later pass finds no further stage for the user.
        scheduler.run_pass().await;
        assert_eq!(courier.sent.lock().unwrap().len(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = std::env::temp_dir().join("rekindle-engine-stop");
        std::fs::remove_dir_all(&dir).ok();
        let store = Arc::new(UserStore::open(&dir.join("users.db")).unwrap());
        store.upsert(5, &UserMeta::default()).unwrap();

        let courier = Arc::new(CountingCourier {
            sent: Mutex::new(Vec::new()),
        });
        let scheduler = WarmupScheduler::new(
            store.clone(),
            courier.clone(),
            plan(&["hello"]),
            Duration::from_millis(20),
            Duration::ZERO,
        );

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.stop().await;

        // At least one tick fired, and the single stage sent exactly once.
        assert_eq!(courier.sent.lock().unwrap().clone(), vec![(5, "hello".to_string())]);
        assert_eq!(store.get(5).unwrap().unwrap().warmup_stage, 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
