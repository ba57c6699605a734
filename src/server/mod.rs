//! Liveness endpoint and keep-alive self-ping.
//!
//! Hosting platforms with an idle-sleep policy need an HTTP endpoint that
//! answers 200 plus periodic inbound traffic; this module provides both.

use axum::routing::get;
use axum::Router;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub fn build_router() -> Router {
    Router::new()
        .route("/", get(healthz))
        .route("/healthz", get(healthz))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Start the liveness server.
pub async fn serve(bind_addr: &str) -> anyhow::Result<()> {
    let app = build_router();
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "liveness endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically GET `url` so the host never idles the process out.
pub fn spawn_self_ping(url: String, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        // the first tick fires immediately, skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match client.get(&url).send().await {
                Ok(resp) => debug!(status = resp.status().as_u16(), "self-ping"),
                Err(e) => warn!(error = %e, "self-ping failed"),
            }
        }
    })
}
