use crate::channel::{tracked_channel, TrackedReceiver};
use crate::metrics::ChannelMetrics;
use crate::reconnect::{next_backoff, ReconnectConfig};
use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider};
use alloy::transports::{RpcError, TransportErrorKind};
use anyhow::Result;
use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Outcome of the initial capability probe. `Unsupported` means the node
/// will never deliver a pending-tx subscription; callers must degrade to
/// another source rather than treat this as an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeSupport {
    Supported,
    Unsupported,
}

pub struct PendingTxStream {
    provider: DynProvider,
    channel_size: usize,
    reconnect: ReconnectConfig,
    metrics: Option<ChannelMetrics>,
}

impl PendingTxStream {
    pub fn new(
        provider: DynProvider,
        channel_size: usize,
        reconnect: ReconnectConfig,
        metrics: Option<ChannelMetrics>,
    ) -> Self {
        Self {
            provider,
            channel_size,
            reconnect,
            metrics,
        }
    }

    /// Probes the subscription capability once, then (when supported)
    /// pumps pending-tx hashes into the returned channel, reconnecting
    /// with exponential backoff. On `Unsupported` no task is spawned and
    /// the receiver yields `None` immediately.
    pub async fn spawn(self) -> Result<(TrackedReceiver<B256>, SubscribeSupport)> {
        let (tx, rx) = tracked_channel(self.channel_size, self.metrics.clone());
        let provider = self.provider;
        let reconnect = self.reconnect;

        let first = match provider.subscribe_pending_transactions().await {
            Ok(sub) => Some(sub),
            Err(err) if is_unsupported(&err) => {
                warn!(?err, "pending-tx subscription unsupported by transport");
                return Ok((rx, SubscribeSupport::Unsupported));
            }
            Err(err) => {
                error!(?err, "pending subscription failed; will retry");
                None
            }
        };

        tokio::spawn(async move {
            let mut backoff = reconnect.base_delay;
            let mut sub = first;
            loop {
                let active = match sub.take() {
                    Some(active) => {
                        backoff = reconnect.base_delay;
                        active
                    }
                    None => match provider.subscribe_pending_transactions().await {
                        Ok(active) => {
                            backoff = reconnect.base_delay;
                            active
                        }
                        Err(err) => {
                            error!(?err, "pending subscription failed");
                            sleep(backoff).await;
                            backoff = next_backoff(backoff, reconnect.max_delay);
                            continue;
                        }
                    },
                };

                let mut stream = active.into_stream();
                while let Some(hash) = stream.next().await {
                    match tx.try_send(hash) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => {
                            warn!("pending stream receiver dropped");
                            return;
                        }
                    }
                }

                info!("pending subscription ended; reconnecting");
                sleep(backoff).await;
                backoff = next_backoff(backoff, reconnect.max_delay);
            }
        });

        Ok((rx, SubscribeSupport::Supported))
    }
}

fn is_unsupported(err: &RpcError<TransportErrorKind>) -> bool {
    match err {
        RpcError::Transport(TransportErrorKind::PubsubUnavailable) => true,
        // -32601: method not found
        RpcError::ErrorResp(payload) => payload.code == -32601,
        _ => false,
    }
}
