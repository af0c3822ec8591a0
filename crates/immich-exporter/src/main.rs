mod access_log;
mod handlers;
mod shutdown;
mod state;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use immich_exporter_core::client::{ClientError, ImmichClient};
use immich_exporter_core::collector::declare_all;
use immich_exporter_core::config::{
    Config, ConfigError, DEFAULT_LISTEN_ADDRESS, DEFAULT_POLL_FREQUENCY_SECS, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_GRACE_SECS, Settings,
};
use immich_exporter_core::registry::{MetricRegistry, RegistryError};
use immich_exporter_core::scheduler::PollScheduler;

use shutdown::{ShutdownCoordinator, ShutdownOutcome, Startup, listen_for_signals};
use state::AppState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "immich-exporter",
    about = "Prometheus exporter for Immich server metrics",
    version = immich_exporter_core::VERSION
)]
struct Args {
    /// Immich server, e.g. `immich.lan:2283` or `https://photos.example.com`.
    #[arg(long, env = "IMMICH_HOST", default_value = "")]
    immich_host: String,

    /// Immich API key.
    #[arg(long, env = "IMMICH_KEY", default_value = "", hide_env_values = true)]
    immich_key: String,

    /// Seconds between poll cycles.
    #[arg(long, env = "POLL_FREQUENCY", default_value_t = DEFAULT_POLL_FREQUENCY_SECS)]
    poll_frequency: u64,

    /// Port to serve /metrics on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// IP address to bind.
    #[arg(long, env = "LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    listen_address: String,

    /// Timeout in seconds for each request to the Immich API.
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout: u64,

    /// Seconds to wait for in-flight work on shutdown before forcing exit.
    #[arg(long, env = "SHUTDOWN_GRACE", default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS)]
    shutdown_grace: u64,
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Settings {
            immich_host: args.immich_host,
            immich_key: args.immich_key,
            poll_frequency_secs: args.poll_frequency,
            listen_address: args.listen_address,
            port: args.port,
            request_timeout_secs: args.request_timeout,
            shutdown_grace_secs: args.shutdown_grace,
        }
    }
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("cannot declare metric series: {0}")]
    Registry(#[from] RegistryError),

    #[error("cannot build tokio runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] io::Error),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "immich_exporter=info,immich_exporter_core=info".into()),
        )
        .init();

    let outcome = match run(args) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "startup failed");
            ShutdownOutcome::Failed
        }
    };
    process::exit(outcome.exit_code());
}

fn run(args: Args) -> Result<ShutdownOutcome, StartupError> {
    let config = Settings::from(args).validate()?;

    // Poll loop and HTTP server share one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;
    block_on_detached(runtime, async_main(config))
}

/// Runs `future` to completion, then shuts the runtime down without waiting
/// for its blocking pool. A DNS lookup stuck there must not hold up the exit.
fn block_on_detached<F: Future>(runtime: tokio::runtime::Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    output
}

async fn async_main(config: Config) -> Result<ShutdownOutcome, StartupError> {
    info!(
        version = immich_exporter_core::VERSION,
        poll_interval_secs = config.poll_interval.as_secs(),
        listen = %config.listen,
        "starting immich exporter"
    );

    let registry = Arc::new(MetricRegistry::new());
    declare_all(&registry)?;

    let client = ImmichClient::new(
        &config.immich_host,
        &config.immich_key,
        config.request_timeout,
    )?;
    info!(base_url = client.base_url(), "polling immich");
    let scheduler = PollScheduler::new(Arc::new(client), registry.clone(), config.poll_interval)?;

    let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_grace));
    listen_for_signals(coordinator.clone()).map_err(StartupError::Signals)?;

    // First cycle completes before the listener opens.
    let scheduler = match coordinator.start_scheduler(scheduler).await {
        Startup::Running(handle) => handle,
        Startup::Stopped(outcome) => return Ok(outcome),
    };

    let listener = match TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(source) => {
            scheduler.stop();
            scheduler.join().await;
            return Err(StartupError::Bind {
                addr: config.listen,
                source,
            });
        }
    };
    info!(addr = %config.listen, "serving /metrics");

    let app = handlers::router(AppState { registry });
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(coordinator.drain_signal());

    Ok(coordinator.run(scheduler, server).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn exit_is_not_held_by_blocking_pool() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let t0 = Instant::now();
        let value = block_on_detached(runtime, async {
            let _stuck = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(10)));
            7
        });

        assert_eq!(value, 7);
        assert!(t0.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn zero_shutdown_grace_is_a_startup_error() {
        let args = Args::parse_from([
            "immich-exporter",
            "--immich-host",
            "immich.lan:2283",
            "--immich-key",
            "secret",
            "--shutdown-grace",
            "0",
        ]);
        assert!(matches!(
            run(args),
            Err(StartupError::Config(ConfigError::ZeroShutdownGrace))
        ));
    }
}
