mod chain;
mod config;
mod farcaster;
mod format;
mod report;
mod server;

use crate::chain::monitor::ChainMonitor;
use crate::chain::ChainSignal;
use crate::config::Config;
use crate::farcaster::NeynarClient;
use crate::format::{Cast, Formatter};
use crate::report::{DailySigners, ReportSchedule};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage.
    // The WebSocket provider needs this to establish TLS connections.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config
    let config = if Path::new("nouncast.toml").exists() {
        Config::load(Path::new("nouncast.toml"))?
    } else {
        info!("no nouncast.toml found, using env-only config");
        Config::from_env()
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("nouncast v{} starting", env!("CARGO_PKG_VERSION"));

    if config.chain.contract.is_empty() {
        error!("no contract address configured (set SIGN_CONTRACT or [chain].contract), exiting");
        return Ok(());
    }

    // --- Publisher ---
    let client = NeynarClient::new(&config.farcaster);
    let (cast_tx, cast_rx) = mpsc::channel::<Cast>(config.farcaster.queue_capacity.max(1));
    farcaster::spawn_publisher(client, cast_rx);

    // --- Chain monitor ---
    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<ChainSignal>();
    let monitor = ChainMonitor::new(config.chain.clone(), signal_tx);
    monitor.start();

    // --- Liveness endpoint + keep-alive ---
    let bind = config.server.bind.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(&bind).await {
            error!(error = %e, "liveness endpoint failed");
        }
    });
    if !config.server.self_ping_url.is_empty() {
        server::spawn_self_ping(
            config.server.self_ping_url.clone(),
            Duration::from_secs(config.server.self_ping_interval_secs),
        );
    }

    // --- Daily report state ---
    let formatter = Formatter::from_config(&config.farcaster);
    let mut signers = DailySigners::new();
    let schedule = ReportSchedule::from_config(&config.report);
    let mut next_fire = schedule.next_fire_after(Utc::now());
    info!(next = %next_fire, "daily report scheduled");

    loop {
        let delay = (next_fire - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            Some(signal) = signal_rx.recv() => match signal {
                ChainSignal::Connected => {
                    info!("chain connected");
                }
                ChainSignal::Disconnected { reason } => {
                    warn!(reason = %reason, "chain disconnected");
                }
                ChainSignal::Staked(event) => {
                    signers.insert(event.user);
                    info!(
                        user = %event.user,
                        token = %event.token_id,
                        block = event.block_number,
                        distinct_today = signers.len(),
                        "stake observed"
                    );
                    enqueue(&cast_tx, formatter.stake_cast(&event));
                }
                ChainSignal::Transferred(event) => {
                    info!(
                        from = %event.from,
                        to = %event.to,
                        token = %event.token_id,
                        "transfer observed"
                    );
                    enqueue(&cast_tx, formatter.transfer_cast(&event));
                }
            },

            _ = tokio::time::sleep(delay) => {
                let count = signers.drain();
                info!(signers = count, "sending daily report");
                enqueue(&cast_tx, formatter.daily_report(count));
                next_fire = schedule.next_fire_after(Utc::now());
                info!(next = %next_fire, "next daily report scheduled");
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Queue a cast for delivery. A full queue drops the cast with a warning:
/// message loss is acceptable, unbounded in-flight publishes are not.
fn enqueue(tx: &mpsc::Sender<Cast>, cast: Cast) {
    use tokio::sync::mpsc::error::TrySendError;
    match tx.try_send(cast) {
        Ok(()) => {}
        Err(TrySendError::Full(cast)) => {
            warn!(text = %cast.text, "publish queue full, dropping cast");
        }
        Err(TrySendError::Closed(_)) => {
            error!("publisher is gone, dropping cast");
        }
    }
}
