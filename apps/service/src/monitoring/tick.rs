//! Tick orchestration: one scan of the store that runs every due check.
//!
//! Ticks come from outside (the daemon's timer or the cron trigger route).
//! Within a process at most one tick runs at a time; a tick that arrives
//! while another is in flight is dropped rather than queued.

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::runner::CheckRunner;
use super::scheduler::due_endpoints;
use crate::database::Database;

/// Counts reported for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Due endpoints a check cycle was started for
    pub checked: usize,
    /// Cycles that stored a measurement (a DOWN result still counts)
    pub succeeded: usize,
    /// Cycles that errored or panicked before storing anything
    pub failed: usize,
    /// Set when another tick was already running
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl TickSummary {
    fn skipped() -> Self {
        Self { skipped: true, ..Self::default() }
    }
}

/// Releases the tick flag when dropped, on every exit path
pub struct TickGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct TickOrchestrator {
    database: Arc<dyn Database>,
    runner: Arc<CheckRunner>,
    running: Arc<AtomicBool>,
}

impl TickOrchestrator {
    pub fn new(database: Arc<dyn Database>, runner: Arc<CheckRunner>) -> Self {
        Self { database, runner, running: Arc::new(AtomicBool::new(false)) }
    }

    /// Claim the tick flag, or `None` if a tick is already running
    pub fn try_begin_tick(&self) -> Option<TickGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard { flag: Arc::clone(&self.running) })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run every due check concurrently and report the counts.
    ///
    /// Per-endpoint failures are tallied, not returned; only failing to load
    /// the endpoint list is an error. The work runs on its own task holding
    /// the tick flag, so dropping the returned future detaches the tick
    /// instead of cancelling checks that already started.
    pub async fn run_tick(&self) -> Result<TickSummary> {
        let Some(guard) = self.try_begin_tick() else {
            debug!("Tick already in progress, dropping this one");
            return Ok(TickSummary::skipped());
        };

        let database = Arc::clone(&self.database);
        let runner = Arc::clone(&self.runner);
        let tick = tokio::spawn(async move {
            let _guard = guard;
            execute_tick(database, runner).await
        });

        tick.await.map_err(|e| anyhow!("Tick task did not complete: {e}"))?
    }

    /// Fire a tick every `period` until the returned handle is aborted.
    ///
    /// Each tick runs on its own task so a slow tick makes the next one hit
    /// the guard instead of delaying the timer.
    pub fn run_periodic(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                let orchestrator = Arc::clone(&self);
                tokio::spawn(async move {
                    if let Err(e) = orchestrator.run_tick().await {
                        error!("Tick failed: {e:#}");
                    }
                });
            }
        })
    }
}

async fn execute_tick(database: Arc<dyn Database>, runner: Arc<CheckRunner>) -> Result<TickSummary> {
    let entries = database.list_active_endpoints_with_last_measurement().await?;
    let due = due_endpoints(entries, Utc::now());

    let mut summary = TickSummary { checked: due.len(), ..TickSummary::default() };
    if due.is_empty() {
        debug!("No endpoints due");
        return Ok(summary);
    }

    let mut tasks = JoinSet::new();
    for endpoint in due {
        let runner = Arc::clone(&runner);
        tasks.spawn(async move {
            let result = runner.run(&endpoint).await;
            (endpoint, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(_))) => summary.succeeded += 1,
            Ok((endpoint, Err(e))) => {
                summary.failed += 1;
                warn!(endpoint_id = %endpoint.id, name = %endpoint.name, "Check cycle failed: {e:#}");
            }
            Err(e) => {
                summary.failed += 1;
                warn!("Check task did not complete: {e}");
            }
        }
    }

    info!(
        checked = summary.checked,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Tick completed"
    );

    Ok(summary)
}
