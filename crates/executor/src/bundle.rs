use crate::relay::BundleRelay;
use crate::sender::Broadcaster;
use alloy::primitives::{Bytes, U256};
use raptor_core::utils::now_ms;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const RELAY_PRIVATE: &str = "private";
pub const RELAY_PUBLIC_FALLBACK: &str = "public-fallback";

/// Ordered signed payloads for one target block. Built immediately before
/// submission and discarded once the outcome is known.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub txs: Vec<Bytes>,
    pub tip: Option<U256>,
    pub target_block: u64,
}

impl Bundle {
    pub fn new(txs: Vec<Bytes>, target_block: u64) -> Self {
        Self {
            txs,
            tip: None,
            target_block,
        }
    }

    pub fn with_tip(mut self, tip: U256) -> Self {
        self.tip = Some(tip);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Building,
    Simulating,
    SubmittingPrivate,
    ConfirmedPrivate,
    FallbackPublic,
    Done,
    Error,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Building => "building",
            SubmissionState::Simulating => "simulating",
            SubmissionState::SubmittingPrivate => "submitting-private",
            SubmissionState::ConfirmedPrivate => "confirmed-private",
            SubmissionState::FallbackPublic => "fallback-public",
            SubmissionState::Done => "done",
            SubmissionState::Error => "error",
        }
    }
}

/// Terminal outcome of one bundle. Partial fallback failures name the
/// index of the leg that failed so the caller can reason about the
/// remainder.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub success: bool,
    pub relay_used: &'static str,
    pub id: Option<String>,
    pub error: Option<String>,
    pub failed_tx_index: Option<usize>,
    pub elapsed_ms: u64,
}

/// Producer payment for private inclusion, proportional to the expected
/// profit and clamped to the configured band.
pub fn compute_tip(
    expected_profit: U256,
    tip_fraction_bps: u32,
    min_tip: U256,
    max_tip: U256,
) -> U256 {
    let raw = expected_profit * U256::from(tip_fraction_bps) / U256::from(10_000u64);
    raw.clamp(min_tip, max_tip)
}

#[derive(Debug, Clone, Copy)]
pub struct SubmitterSettings {
    pub simulate_before_send: bool,
    pub submission_timeout: Duration,
}

/// Drives one bundle through the submission state machine:
/// Building -> [Simulating] -> SubmittingPrivate ->
/// {ConfirmedPrivate | FallbackPublic} -> Done, with Error terminal from
/// any state. Always returns a terminal result, never hangs past the
/// submission timeout, and never panics the caller.
pub struct BundleSubmitter {
    relay: Arc<dyn BundleRelay>,
    broadcaster: Arc<dyn Broadcaster>,
    settings: SubmitterSettings,
}

impl BundleSubmitter {
    pub fn new(
        relay: Arc<dyn BundleRelay>,
        broadcaster: Arc<dyn Broadcaster>,
        settings: SubmitterSettings,
    ) -> Self {
        Self {
            relay,
            broadcaster,
            settings,
        }
    }

    pub async fn submit(&self, bundle: Bundle) -> SubmissionResult {
        let started_ms = now_ms();

        if !self.relay.is_available() {
            info!("private relay unavailable; going straight to public broadcast");
            return self.fallback_public(&bundle, started_ms).await;
        }

        if self.settings.simulate_before_send {
            debug!(state = SubmissionState::Simulating.as_str(), "bundle state");
            match self.relay.simulate_bundle(&bundle).await {
                Ok(report) if !report.success => {
                    // terminal: the bundle would fail on-chain; spend nothing
                    let reason = report.error.unwrap_or_else(|| "unspecified".to_string());
                    info!(%reason, "relay simulation rejected bundle");
                    return SubmissionResult {
                        success: false,
                        relay_used: RELAY_PRIVATE,
                        id: None,
                        error: Some(format!("bundle would fail: {reason}")),
                        failed_tx_index: None,
                        elapsed_ms: now_ms().saturating_sub(started_ms),
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    // verdict unknown, not a rejection; continue unsimulated
                    warn!(?err, "relay simulation unavailable");
                }
            }
        }

        debug!(
            state = SubmissionState::SubmittingPrivate.as_str(),
            target_block = bundle.target_block,
            "bundle state"
        );
        match timeout(
            self.settings.submission_timeout,
            self.relay.submit_bundle(&bundle),
        )
        .await
        {
            Ok(Ok(report)) if report.success => {
                info!(
                    bundle_hash = report.bundle_hash.as_deref().unwrap_or("<none>"),
                    "bundle accepted by private relay"
                );
                SubmissionResult {
                    success: true,
                    relay_used: RELAY_PRIVATE,
                    id: report.bundle_hash,
                    error: None,
                    failed_tx_index: None,
                    elapsed_ms: now_ms().saturating_sub(started_ms),
                }
            }
            Ok(Ok(report)) => {
                info!(error = ?report.error, "relay rejected bundle; falling back");
                self.fallback_public(&bundle, started_ms).await
            }
            Ok(Err(err)) => {
                warn!(?err, "relay submission failed; falling back");
                self.fallback_public(&bundle, started_ms).await
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.submission_timeout.as_millis(),
                    "relay submission timed out; falling back"
                );
                self.fallback_public(&bundle, started_ms).await
            }
        }
    }

    /// Sequential per-leg broadcast. Atomicity is a private-relay-only
    /// guarantee; this path knowingly gives it up.
    async fn fallback_public(&self, bundle: &Bundle, started_ms: u64) -> SubmissionResult {
        debug!(state = SubmissionState::FallbackPublic.as_str(), "bundle state");
        let mut last_hash = None;
        for (index, raw) in bundle.txs.iter().enumerate() {
            match self.broadcaster.broadcast(raw).await {
                Ok(hash) => last_hash = Some(hash),
                Err(err) => {
                    return SubmissionResult {
                        success: false,
                        relay_used: RELAY_PUBLIC_FALLBACK,
                        id: last_hash.map(|h| format!("{h:?}")),
                        error: Some(format!("leg {index} broadcast failed: {err}")),
                        failed_tx_index: Some(index),
                        elapsed_ms: now_ms().saturating_sub(started_ms),
                    };
                }
            }
        }
        SubmissionResult {
            success: true,
            relay_used: RELAY_PUBLIC_FALLBACK,
            id: last_hash.map(|h| format!("{h:?}")),
            error: None,
            failed_tx_index: None,
            elapsed_ms: now_ms().saturating_sub(started_ms),
        }
    }
}
