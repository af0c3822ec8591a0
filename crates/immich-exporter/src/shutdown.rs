//! Shutdown coordination between the signal listener, the poll scheduler and
//! the HTTP server.
//!
//! The first termination signal stops the scheduler and tells the server to
//! stop accepting connections. Both then get one grace period to finish what
//! is in flight; whatever is still running afterwards is abandoned and the
//! process exits with the forced status.

use std::future::{Future, IntoFuture};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use immich_exporter_core::client::ImmichSource;
use immich_exporter_core::scheduler::{PollScheduler, SchedulerHandle};

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownOutcome {
    /// Everything drained within the grace period.
    Clean,
    /// The grace period elapsed with work still in flight.
    Forced,
    /// The server stopped on its own or with an error.
    Failed,
}

impl ShutdownOutcome {
    pub(crate) fn exit_code(self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::Forced => 3,
            ShutdownOutcome::Failed => 1,
        }
    }
}

/// Result of [`ShutdownCoordinator::start_scheduler`].
#[derive(Debug)]
pub(crate) enum Startup {
    Running(SchedulerHandle),
    /// Shutdown was requested during the first cycle.
    Stopped(ShutdownOutcome),
}

pub(crate) struct ShutdownCoordinator {
    grace: Duration,
    triggered: AtomicBool,
    trigger_tx: watch::Sender<bool>,
    drain_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub(crate) fn new(grace: Duration) -> Self {
        let (trigger_tx, _) = watch::channel(false);
        let (drain_tx, _) = watch::channel(false);
        Self {
            grace,
            triggered: AtomicBool::new(false),
            trigger_tx,
            drain_tx,
        }
    }

    /// Starts the shutdown sequence. Only the first call has an effect;
    /// returns whether this call was it.
    pub(crate) fn trigger(&self, reason: &str) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            warn!(reason, "shutdown already in progress, ignoring");
            return false;
        }
        info!(
            reason,
            grace_secs = self.grace.as_secs_f64(),
            "shutdown requested"
        );
        self.trigger_tx.send_replace(true);
        true
    }

    /// Resolves once the server should stop accepting connections.
    /// Meant for `axum::serve(..).with_graceful_shutdown`.
    pub(crate) fn drain_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        wait_until_set(self.drain_tx.subscribe())
    }

    /// Runs the scheduler's first cycle, racing it against a shutdown
    /// request. A first cycle interrupted that way gets the grace period to
    /// finish; the scheduler never reaches its interval loop.
    pub(crate) async fn start_scheduler<S: ImmichSource>(
        &self,
        scheduler: PollScheduler<S>,
    ) -> Startup {
        let start = scheduler.start();
        tokio::pin!(start);

        tokio::select! {
            handle = &mut start => return Startup::Running(handle),
            _ = wait_until_set(self.trigger_tx.subscribe()) => {}
        }

        let finished = tokio::time::timeout(self.grace, async {
            let handle = (&mut start).await;
            handle.stop();
            handle.join().await;
        })
        .await;

        match finished {
            Ok(()) => {
                info!("shutdown complete before serving");
                Startup::Stopped(ShutdownOutcome::Clean)
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs_f64(),
                    "grace period elapsed during the first poll cycle, forcing exit"
                );
                Startup::Stopped(ShutdownOutcome::Forced)
            }
        }
    }

    /// Drives the server until shutdown is triggered, then runs the stop
    /// sequence: scheduler first, then the listener, then both race the
    /// grace period.
    pub(crate) async fn run<F>(&self, scheduler: SchedulerHandle, server: F) -> ShutdownOutcome
    where
        F: IntoFuture<Output = io::Result<()>>,
    {
        let server = server.into_future();
        tokio::pin!(server);

        let early = tokio::select! {
            result = &mut server => Some(result),
            _ = wait_until_set(self.trigger_tx.subscribe()) => None,
        };
        if let Some(result) = early {
            match result {
                Ok(()) => error!("HTTP server stopped without a shutdown request"),
                Err(e) => error!(error = %e, "HTTP server failed"),
            }
            scheduler.stop();
            scheduler.join().await;
            return ShutdownOutcome::Failed;
        }

        let t0 = Instant::now();
        scheduler.stop();
        self.drain_tx.send_replace(true);

        let drained = tokio::time::timeout(self.grace, async {
            let (served, ()) = tokio::join!(&mut server, scheduler.join());
            served
        })
        .await;

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        match drained {
            Ok(Ok(())) => {
                info!(elapsed_ms, "shutdown complete");
                ShutdownOutcome::Clean
            }
            Ok(Err(e)) => {
                error!(error = %e, elapsed_ms, "HTTP server failed while draining");
                ShutdownOutcome::Failed
            }
            Err(_) => {
                warn!(
                    grace_secs = self.grace.as_secs_f64(),
                    "grace period elapsed with requests or a poll cycle still in flight, forcing exit"
                );
                ShutdownOutcome::Forced
            }
        }
    }
}

async fn wait_until_set(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Coordinator dropped without triggering.
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================
// Signals
// ============================================================

/// Installs SIGTERM and SIGINT handlers and forwards every delivery to the
/// coordinator. Fails only if the handlers cannot be registered.
#[cfg(unix)]
pub(crate) fn listen_for_signals(
    coordinator: Arc<ShutdownCoordinator>,
) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    Ok(tokio::spawn(async move {
        loop {
            let reason = tokio::select! {
                Some(()) = term.recv() => "SIGTERM",
                Some(()) = int.recv() => "SIGINT",
                else => break,
            };
            coordinator.trigger(reason);
        }
    }))
}

#[cfg(not(unix))]
pub(crate) fn listen_for_signals(
    coordinator: Arc<ShutdownCoordinator>,
) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for ctrl-c");
                break;
            }
            coordinator.trigger("ctrl-c");
        }
    }))
}
