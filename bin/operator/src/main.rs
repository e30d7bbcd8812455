//! Rollup operator node
//!
//! Holds the account tree and exposes the engine over JSON-RPC:
//! - deposits are queued and merged into empty subtrees
//! - signed transfer batches are applied and their witness returned
//! - withdrawals from committed batches are released once

mod config;
mod rpc;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use rollup_core::{Rollup, SignatureScheme};
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::rpc::{health, rpc_handler};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting rollup operator...");

    let config = Config::from_env()?;
    info!("  Tree depth: {}", config.rollup.tree_depth);
    info!("  Batch depth: {}", config.rollup.tx_batch_depth);
    info!("  Receiver policy: {:?}", config.rollup.receiver_policy);

    let mut rollup = Rollup::new(config.rollup.clone())?;
    if let Some(key) = &config.coordinator_key {
        let coordinator = rollup.scheme().public_key(key);
        rollup.genesis_deposits(coordinator)?;
        info!(x = %coordinator.x, y = %coordinator.y, "genesis deposits queued");
    }

    let state = Arc::new(RwLock::new(rollup));
    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/", post(rpc_handler))
        .with_state(state);

    info!("RPC server listening on {}", config.rpc_addr);
    let listener = tokio::net::TcpListener::bind(&config.rpc_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
