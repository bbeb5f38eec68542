//! Periodic cleanup, statistics and cache health checks.
//!
//! [`Maintenance`] bundles the individual tasks so they can be run on
//! demand. [`MaintenanceScheduler`] runs them on fixed intervals in a
//! background task until it is stopped or dropped.

use jiff::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tinylink_cache::UrlCache;
use tinylink_core::{Clock, MappingStore};
use tinylink_generator::Generator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

use crate::{ResolutionEngine, Result, RetentionSweeper};

/// Tracing target for statistics and cleanup counts.
pub const STATS_TARGET: &str = "tinylink::stats";

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, TypedBuilder)]
pub struct MaintenanceSettings {
    /// Mappings older than this many days are removed by cleanup.
    #[builder(default = 30)]
    pub retention_days: u32,
    #[builder(default = true)]
    pub cleanup_enabled: bool,
    #[builder(default = true)]
    pub statistics_enabled: bool,
    #[builder(default = Duration::from_secs(24 * 60 * 60))]
    pub cleanup_interval: Duration,
    #[builder(default = Duration::from_secs(60 * 60))]
    pub statistics_interval: Duration,
    #[builder(default = Duration::from_secs(30 * 60))]
    pub health_check_interval: Duration,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A point-in-time snapshot of the system.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub total_mappings: u64,
    pub cache_available: bool,
    pub collected_at: Timestamp,
}

/// The maintenance tasks, runnable on demand or from [`MaintenanceScheduler`].
pub struct Maintenance<S, C, G, K> {
    engine: Arc<ResolutionEngine<S, C, G, K>>,
    sweeper: RetentionSweeper<S, C, G, K>,
    settings: MaintenanceSettings,
}

impl<S, C, G, K> Maintenance<S, C, G, K>
where
    S: MappingStore,
    C: UrlCache,
    G: Generator,
    K: Clock,
{
    pub fn new(engine: Arc<ResolutionEngine<S, C, G, K>>, settings: MaintenanceSettings) -> Self {
        Self {
            sweeper: RetentionSweeper::new(Arc::clone(&engine)),
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &MaintenanceSettings {
        &self.settings
    }

    /// Sweeps mappings past the retention period.
    ///
    /// Returns `Ok(None)` without touching the store when cleanup is disabled.
    pub async fn run_cleanup(&self) -> Result<Option<u64>> {
        if !self.settings.cleanup_enabled {
            debug!("Cleanup is disabled, skipping");
            return Ok(None);
        }

        let before = self.engine.count().await?;
        let deleted = self.sweeper.sweep(self.settings.retention_days).await?;
        let after = self.engine.count().await?;

        info!(
            target: STATS_TARGET,
            retention_days = self.settings.retention_days,
            before,
            deleted,
            after,
            "Cleanup completed"
        );
        Ok(Some(deleted))
    }

    pub async fn collect_statistics(&self) -> Result<Statistics> {
        let total_mappings = self.engine.count().await?;
        let cache_available = self.engine.cache_available().await;

        Ok(Statistics {
            total_mappings,
            cache_available,
            collected_at: self.engine.clock().now(),
        })
    }

    /// Collects and logs statistics. Returns `Ok(None)` when statistics are disabled.
    pub async fn log_statistics(&self) -> Result<Option<Statistics>> {
        if !self.settings.statistics_enabled {
            debug!("Statistics are disabled, skipping");
            return Ok(None);
        }

        let stats = self.collect_statistics().await?;
        info!(
            target: STATS_TARGET,
            total_mappings = stats.total_mappings,
            cache_available = stats.cache_available,
            collected_at = %stats.collected_at,
            "System statistics"
        );
        Ok(Some(stats))
    }

    /// Probes the cache and logs the outcome.
    pub async fn check_cache_health(&self) -> bool {
        let available = self.engine.cache_available().await;
        if available {
            debug!("Cache health check passed");
        } else {
            warn!("Cache health check failed, lookups are served by the store");
        }
        available
    }
}

/// Handle to the background maintenance task.
///
/// The task stops when [`stop`](Self::stop) is called or the handle is dropped.
#[derive(Debug)]
pub struct MaintenanceScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceScheduler {
    /// Spawns the scheduler on the current tokio runtime.
    ///
    /// Each task first runs one full interval after start.
    pub fn start<S, C, G, K>(maintenance: Maintenance<S, C, G, K>) -> Self
    where
        S: MappingStore,
        C: UrlCache,
        G: Generator,
        K: Clock,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let settings = maintenance.settings();
        info!(
            cleanup_enabled = settings.cleanup_enabled,
            statistics_enabled = settings.statistics_enabled,
            retention_days = settings.retention_days,
            "Maintenance scheduler started"
        );

        let handle = tokio::spawn(scheduler_loop(maintenance, shutdown_rx));

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signals the background task to stop. Does not wait for it.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the background task and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Maintenance scheduler task failed");
            }
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn every(period: Duration) -> Interval {
    let period = period.max(MIN_PERIOD);
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn scheduler_loop<S, C, G, K>(
    maintenance: Maintenance<S, C, G, K>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: MappingStore,
    C: UrlCache,
    G: Generator,
    K: Clock,
{
    let settings = maintenance.settings().clone();
    let mut cleanup = every(settings.cleanup_interval);
    let mut statistics = every(settings.statistics_interval);
    let mut health = every(settings.health_check_interval);

    loop {
        tokio::select! {
            _ = cleanup.tick() => {
                if let Err(e) = maintenance.run_cleanup().await {
                    error!(error = %e, "Scheduled cleanup failed");
                }
            }
            _ = statistics.tick() => {
                if let Err(e) = maintenance.log_statistics().await {
                    error!(error = %e, "Scheduled statistics collection failed");
                }
            }
            _ = health.tick() => {
                maintenance.check_cache_health().await;
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Maintenance scheduler received shutdown signal");
                    break;
                }
            }
        }
    }

    info!("Maintenance scheduler stopped");
}
