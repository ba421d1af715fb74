//! Turnstile Bridge
//!
//! Runs the scheduled expiry sweep and serves the function endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use turnstile_bridge::api::{AppState, build_router};
use turnstile_bridge::emitter::CommandEmitter;
use turnstile_bridge::engine::ReconcileEngine;
use turnstile_bridge::relay::RelayClient;
use turnstile_bridge::storage::BridgeDatabase;
use turnstile_core::Config;
use turnstile_core::config::{default_database_path, load_config};
use turnstile_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "turnstile-bridge")]
#[command(
    version,
    about = "Turnstile bridge - keeps biometric terminals in line with membership state"
)]
struct Args {
    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to serve the function endpoints on.
    #[arg(long, env = "TURNSTILE_ADDR")]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Base URL of the device relay.
    #[arg(long)]
    relay_url: Option<String>,

    /// Shared secret sent to the device relay.
    #[arg(long)]
    relay_secret: Option<String>,

    /// Seconds between scheduled sweeps (0 disables the scheduler).
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Run one sweep and exit.
    #[arg(long)]
    once: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// CLI flags take priority over file and environment settings.
    fn apply(&self, config: &mut Config) {
        if let Some(addr) = self.addr {
            config.server.addr = addr;
        }
        if let Some(path) = &self.db_path {
            config.database_path = Some(path.clone());
        }
        if let Some(url) = &self.relay_url {
            config.relay.base_url.clone_from(url);
        }
        if let Some(secret) = &self.relay_secret {
            config.relay.shared_secret.clone_from(secret);
        }
        if let Some(interval) = self.sweep_interval {
            config.sweep.interval_secs = interval;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("turnstile_bridge=info", args.log_json);

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        relay = %config.relay.base_url,
        "Starting turnstile-bridge"
    );

    let db_path = match config.database_path.clone() {
        Some(path) => path,
        None => default_database_path()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine data directory"))?,
    };
    info!(path = %db_path.display(), "Opening bridge database");
    let db = BridgeDatabase::open(&db_path).await?;

    let relay = RelayClient::new(&config.relay)?;
    let emitter = CommandEmitter::new(Arc::new(relay), db.clone());
    let engine = ReconcileEngine::new(db, emitter, config.sweep.effective_concurrency());

    if args.once {
        let report = engine.reconcile_all().await?;
        info!(
            processed = report.processed,
            failed = report.failed_count(),
            "One-shot sweep complete"
        );
        return Ok(());
    }

    if config.sweep.interval_secs > 0 {
        spawn_sweep(engine.clone(), Duration::from_secs(config.sweep.interval_secs));
    } else {
        info!("Scheduled sweep disabled");
    }

    let app = build_router(AppState { engine });
    let listener = tokio::net::TcpListener::bind(config.server.addr).await?;
    info!(addr = %config.server.addr, "Function server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

/// Run the expiry sweep on a fixed interval.
fn spawn_sweep(engine: ReconcileEngine, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            match engine.reconcile_all().await {
                Ok(report) if report.failed_count() > 0 => {
                    warn!(
                        processed = report.processed,
                        failed = report.failed_count(),
                        "Scheduled sweep finished with failures"
                    );
                }
                Ok(report) => {
                    info!(processed = report.processed, "Scheduled sweep completed");
                }
                Err(e) => {
                    warn!(error = %e, "Scheduled sweep failed");
                }
            }
        }
    });
}
