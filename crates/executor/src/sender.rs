use alloy::primitives::{Bytes, B256};
use alloy::providers::{DynProvider, Provider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

/// Ordinary public broadcast. The fallback path of the submission
/// protocol and the only path on relay-less configurations.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, raw: &Bytes) -> Result<B256>;
}

#[derive(Clone)]
pub struct TxSender {
    provider: DynProvider,
    send_timeout: Duration,
}

impl TxSender {
    pub fn new(provider: DynProvider, send_timeout_ms: u64) -> Self {
        Self {
            provider,
            send_timeout: Duration::from_millis(send_timeout_ms),
        }
    }
}

#[async_trait]
impl Broadcaster for TxSender {
    async fn broadcast(&self, raw: &Bytes) -> Result<B256> {
        let pending = timeout(
            self.send_timeout,
            self.provider.send_raw_transaction(raw.as_ref()),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "broadcast timed out after {}ms",
                self.send_timeout.as_millis()
            )
        })??;
        let hash = *pending.tx_hash();
        info!(%hash, "tx broadcast");
        Ok(hash)
    }
}
