//! Periodic driver of the coordinator.
//!
//! One tick scrapes the overview, reconciles every kind against it and then
//! runs maintenance. The sleep between ticks is jittered so requests never
//! line up on a fixed interval. A failed scrape skips reconciliation for
//! that tick only; maintenance still runs.

use super::config::SchedulerConfig;
use super::coordinator::{Coordinator, MaintenanceReport};
use super::pause::jittered;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tick {
    pub reconciled: bool,
    pub maintenance: MaintenanceReport,
}

pub struct Scheduler {
    coordinator: Arc<Coordinator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        let config = coordinator.config().scheduler.clone();
        Self { coordinator, config }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub async fn tick(&self) -> Tick {
        let reconciled = match self.coordinator.fetch_snapshot().await {
            Ok(snapshot) => match self.coordinator.tick_reconcile(&snapshot).await {
                Ok(views) => {
                    debug!(kinds = views.len(), "reconciled");
                    true
                }
                Err(err) => {
                    warn!(%err, "reconcile pass aborted");
                    false
                }
            },
            Err(err) => {
                warn!(%err, "snapshot failed");
                false
            }
        };

        let maintenance = self.coordinator.tick_maintenance().await;
        Tick { reconciled, maintenance }
    }

    fn next_sleep(&self) -> Duration {
        jittered(Duration::from_secs(self.config.tick_interval_secs), self.config.tick_jitter)
    }

    /// Recovers interrupted runs, then ticks until the task is dropped.
    pub async fn run(&self) -> Result<()> {
        let recovered = self.coordinator.recover().await?;
        if !recovered.finished.is_empty() || !recovered.expired.is_empty() {
            info!(finished = ?recovered.finished, expired = ?recovered.expired, "recovered interrupted runs");
        }

        loop {
            let tick = self.tick().await;
            let maintenance = &tick.maintenance;
            if !maintenance.finished.is_empty() || !maintenance.started.is_empty() || !maintenance.abandoned.is_empty() || maintenance.sold {
                info!(
                    finished = ?maintenance.finished,
                    started = ?maintenance.started,
                    abandoned = ?maintenance.abandoned,
                    sold = maintenance.sold,
                    "maintenance"
                );
            }
            let sleep = self.next_sleep();
            debug!(secs = sleep.as_secs(), "sleeping until next tick");
            tokio::time::sleep(sleep).await;
        }
    }
}
