//! VRNouns leaderboard backfill: scans a recent block range for Staked
//! events, ranks signers by stake count, and logs the top list.
//!
//! Usage:
//!   cargo run --bin leaderboard            # scan and log only
//!   cargo run --bin leaderboard -- --post  # also post the board as a cast

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{bail, Result};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use nouncast::chain::scanner::{scan_range, ChainLogSource};
use nouncast::config::Config;
use nouncast::farcaster::NeynarClient;
use nouncast::format::Formatter;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let _ = dotenvy::dotenv();

    let config = if Path::new("nouncast.toml").exists() {
        Config::load(Path::new("nouncast.toml"))?
    } else {
        Config::from_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let post = std::env::args().any(|a| a == "--post");

    if config.chain.http_url.is_empty() {
        bail!("no HTTP RPC URL configured (set BASE_RPC_HTTPS or [chain].http_url)");
    }
    let contract = Address::from_str(&config.chain.contract)
        .map_err(|e| anyhow::anyhow!("invalid contract address {:?}: {e}", config.chain.contract))?;

    let provider = ProviderBuilder::new().connect_http(config.chain.http_url.parse()?);
    let latest = provider.get_block_number().await?;
    let from = latest.saturating_sub(config.scanner.lookback_blocks);

    info!(
        from = from,
        to = latest,
        window = config.scanner.window_blocks,
        "scanning for Staked events"
    );

    let source = ChainLogSource::new(provider, contract);
    // latest + 1: the scan range is end-exclusive and the tip block counts
    let board = scan_range(
        &source,
        from,
        latest + 1,
        config.scanner.window_blocks,
        config.scanner.top_n,
    )
    .await;

    if board.is_empty() {
        warn!("no Staked events found in the scanned range");
        return Ok(());
    }

    let formatter = Formatter::from_config(&config.farcaster);
    let cast = formatter.leaderboard_cast(&board);
    info!("\n{}", cast.text);

    if post {
        let client = NeynarClient::new(&config.farcaster);
        if !client.is_configured() {
            bail!("cannot post: NEYNAR_API_KEY / SIGNER_UUID not set");
        }
        client.publish_with_retry(&cast).await;
    }

    Ok(())
}
