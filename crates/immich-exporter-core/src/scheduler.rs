//! Poll loop: runs the domain collectors once at startup and then on a fixed
//! interval until stopped.
//!
//! The next cycle is scheduled only after the previous one has finished, so
//! cycles never overlap and a slow server stretches the cadence instead of
//! piling up work. Stopping cancels the pending wait; a cycle that is already
//! running finishes normally.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{FetchError, ImmichSource};
use crate::collector::{self, Domain, exporter};
use crate::registry::{Batch, MetricRegistry, RegistryError};

/// Failure of one domain within a cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("registry rejected batch: {0}")]
    Registry(#[from] RegistryError),
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub failed: Vec<Domain>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PollScheduler<S> {
    source: Arc<S>,
    registry: Arc<MetricRegistry>,
    interval: Duration,
    cycle: u64,
}

impl<S: ImmichSource> PollScheduler<S> {
    /// Creates a scheduler over an already declared registry.
    pub fn new(
        source: Arc<S>,
        registry: Arc<MetricRegistry>,
        interval: Duration,
    ) -> Result<Self, RegistryError> {
        registry.apply(exporter::initial())?;
        Ok(Self {
            source,
            registry,
            interval,
            cycle: 0,
        })
    }

    /// Runs Storage, Statistics and Jobs in that order.
    ///
    /// A failing domain keeps its previous values and does not stop the
    /// domains after it.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let cycle = self.cycle;
        let t0 = Instant::now();
        let mut failed = Vec::new();

        debug!(cycle, "poll cycle started");
        for domain in Domain::ALL {
            if let Err(e) = self.collect_domain(domain).await {
                match &e {
                    CycleError::Fetch(fetch) => warn!(
                        cycle,
                        %domain,
                        path = fetch.path(),
                        error = %e,
                        "collection failed, keeping previous values"
                    ),
                    CycleError::Registry(_) => error!(
                        cycle,
                        %domain,
                        error = %e,
                        "collector produced an invalid batch"
                    ),
                }
                self.record(exporter::domain_failed(domain));
                failed.push(domain);
            }
        }

        let duration = t0.elapsed();
        self.record(exporter::cycle_finished(duration));

        let duration_ms = duration.as_millis() as u64;
        if cycle == 1 {
            info!(cycle, duration_ms, failed = failed.len(), "first poll cycle completed");
        } else {
            debug!(cycle, duration_ms, failed = failed.len(), "poll cycle completed");
        }
        if duration > self.interval / 2 {
            warn!(
                cycle,
                duration_ms,
                interval_ms = self.interval.as_millis() as u64,
                "poll cycle exceeded 50% of interval"
            );
        }

        CycleReport {
            cycle,
            failed,
            duration,
        }
    }

    async fn collect_domain(&self, domain: Domain) -> Result<(), CycleError> {
        let mut batch = match domain {
            Domain::Storage => collector::storage::collect(&self.source.server_storage().await?),
            Domain::Statistics => {
                collector::statistics::collect(&self.source.server_statistics().await?)
            }
            Domain::Jobs => collector::jobs::collect(&self.source.jobs().await?),
        };
        batch.extend(exporter::domain_succeeded(
            domain,
            chrono::Utc::now().timestamp(),
        ));
        self.registry.apply(batch)?;
        Ok(())
    }

    // Bookkeeping series are declared by `collector::declare_all`; a rejection
    // here means the registry was built without them.
    fn record(&self, batch: Batch) {
        if let Err(e) = self.registry.apply(batch) {
            error!(error = %e, "exporter bookkeeping rejected by registry");
        }
    }

    /// Runs the first cycle to completion, then continues on the interval in
    /// a background task.
    pub async fn start(mut self) -> SchedulerHandle {
        let first = self.run_cycle().await;
        if !first.is_clean() {
            warn!(
                failed = ?first.failed,
                "first poll cycle incomplete, affected domains stay empty until a later cycle succeeds"
            );
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run_loop(stop_rx));
        SchedulerHandle { stop_tx, task }
    }

    async fn run_loop(mut self, mut stop: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "poll scheduler running"
        );
        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.run_cycle().await;
        }
        info!(cycles = self.cycle, "poll scheduler stopped");
    }
}

/// Control handle of a started [`PollScheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cancels the pending wait. Idempotent.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop to exit, including any cycle still in flight.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "poll scheduler task failed");
        }
    }
}
