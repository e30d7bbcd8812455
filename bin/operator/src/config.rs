//! Configuration

use std::env;

use anyhow::{Context, Result};
use rollup_core::{PrivateKey, ReceiverPolicy, RollupConfig};

/// Operator configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// JSON-RPC listen address
    pub rpc_addr: String,
    /// Engine parameters
    pub rollup: RollupConfig,
    /// Coordinator key; when set, genesis deposits are queued at startup
    pub coordinator_key: Option<PrivateKey>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_addr: "0.0.0.0:8547".to_string(),
            rollup: RollupConfig::default(),
            coordinator_key: None,
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let parsed = |name: &str, default: usize| {
            lookup(name)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let receiver_policy = if lookup("ROLLUP_REGISTER_ON_TRANSFER")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false)
        {
            ReceiverPolicy::RegisterOnTransfer
        } else {
            ReceiverPolicy::RequireRegistered
        };

        let coordinator_key = lookup("ROLLUP_COORDINATOR_KEY")
            .map(|s| parse_key(&s))
            .transpose()
            .context("invalid ROLLUP_COORDINATOR_KEY")?;

        Ok(Self {
            rpc_addr: lookup("ROLLUP_RPC_ADDR").unwrap_or(defaults.rpc_addr),
            rollup: RollupConfig {
                tree_depth: parsed("ROLLUP_TREE_DEPTH", defaults.rollup.tree_depth),
                tx_batch_depth: parsed("ROLLUP_TX_BATCH_DEPTH", defaults.rollup.tx_batch_depth),
                receiver_policy,
            },
            coordinator_key,
        })
    }
}

/// 32-byte hex seed, with or without `0x`
fn parse_key(s: &str) -> Result<PrivateKey> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x"))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("expected 32 bytes, got {}", b.len()))?;
    Ok(PrivateKey::from_bytes(seed))
}
