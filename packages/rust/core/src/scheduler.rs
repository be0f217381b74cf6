//! Automatic triggering of batch runs: once shortly after startup, then on a
//! fixed interval. Each firing re-reads the auto-trigger flag, so toggling it
//! at runtime takes effect on the next tick.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use toolscout_shared::PipelineConfig;

use crate::engine::{BatchSummary, EnrichmentEngine, SilentProgress};

/// Runtime-mutable switch for scheduled runs. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct AutoTrigger(Arc<AtomicBool>);

impl AutoTrigger {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        let was = self.0.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            info!(enabled, "auto-trigger changed");
        }
    }
}

/// What caused a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Startup,
    Interval,
    Manual,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Interval => "interval",
            Self::Manual => "manual",
        })
    }
}

/// Fires [`EnrichmentEngine::run_all_pending`] on the startup delay and on
/// every interval tick while the [`AutoTrigger`] is enabled.
pub struct Scheduler {
    engine: Arc<EnrichmentEngine>,
    trigger: AutoTrigger,
    startup_delay: Duration,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        engine: Arc<EnrichmentEngine>,
        trigger: AutoTrigger,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            engine,
            trigger,
            startup_delay: config.startup_delay,
            interval: config.interval,
        }
    }

    /// Run one batch if the flag allows it. `Manual` ignores the flag.
    ///
    /// Returns `None` when skipped or when the work set could not be selected.
    pub async fn fire(&self, source: TriggerSource) -> Option<BatchSummary> {
        if source != TriggerSource::Manual && !self.trigger.is_enabled() {
            debug!(%source, "auto-trigger disabled, skipping run");
            return None;
        }

        info!(%source, "triggering enrichment run");
        match self.engine.run_all_pending(&SilentProgress).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(%source, error = %e, "enrichment run failed");
                None
            }
        }
    }

    /// Spawn the startup and interval tasks.
    ///
    /// The interval's first tick is one full interval after start. A run
    /// that overruns the interval delays the next tick instead of bursting.
    pub fn start(self) -> SchedulerHandle {
        let scheduler = Arc::new(self);

        let startup = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                tokio::time::sleep(scheduler.startup_delay).await;
                scheduler.fire(TriggerSource::Startup).await;
            })
        };

        let periodic = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(
                    Instant::now() + scheduler.interval,
                    scheduler.interval,
                );
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    scheduler.fire(TriggerSource::Interval).await;
                }
            })
        };

        info!(
            startup_delay_secs = scheduler.startup_delay.as_secs(),
            interval_secs = scheduler.interval.as_secs(),
            enabled = scheduler.trigger.is_enabled(),
            "scheduler started"
        );

        SchedulerHandle {
            tasks: vec![startup, periodic],
        }
    }
}

/// Owns the spawned scheduler tasks.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop future firings. A batch already in flight is cancelled at its
    /// next await point; its completed records keep their terminal status.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        debug!("scheduler stopped");
    }
}
