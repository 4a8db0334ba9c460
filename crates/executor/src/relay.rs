use crate::bundle::Bundle;
use alloy::primitives::{keccak256, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use raptor_core::config::RelayConfig;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

/// Relay-reported simulation verdict. `Ok` with `success: false` means
/// the bundle would fail on-chain; a transport-level `Err` means the
/// verdict is unknown.
#[derive(Debug, Clone)]
pub struct BundleSimReport {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BundleSubmitReport {
    pub success: bool,
    pub bundle_hash: Option<String>,
    pub error: Option<String>,
}

/// Capability-checked private submission channel. Implementations must
/// answer `is_available` without touching the network so the protocol can
/// branch on it synchronously.
#[async_trait]
pub trait BundleRelay: Send + Sync {
    fn is_available(&self) -> bool;
    async fn simulate_bundle(&self, bundle: &Bundle) -> Result<BundleSimReport>;
    async fn submit_bundle(&self, bundle: &Bundle) -> Result<BundleSubmitReport>;
}

/// Flashbots-style JSON-RPC relay client. Requests carry the
/// `X-Flashbots-Signature` identity header over the keccak of the body.
pub struct RelayClient {
    http: reqwest::Client,
    url: Option<String>,
    identity: Option<PrivateKeySigner>,
}

impl RelayClient {
    /// A configured URL with no reachable identity key is a configuration
    /// error: the relay would reject every request at runtime.
    pub fn from_config(cfg: &RelayConfig, fallback_key_env: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.submission_timeout_ms))
            .build()
            .map_err(|err| anyhow!("relay http client build failed: {err}"))?;

        let identity = match cfg.url.as_deref() {
            None => None,
            Some(_) => {
                let env_var = cfg
                    .identity_key_env
                    .as_deref()
                    .unwrap_or(fallback_key_env);
                let raw = std::env::var(env_var).map_err(|_| {
                    anyhow!("relay url configured but identity key env {env_var} is not set")
                })?;
                let key = B256::from_str(raw.trim().trim_start_matches("0x"))
                    .map_err(|_| anyhow!("relay identity key in {env_var} is malformed"))?;
                Some(
                    PrivateKeySigner::from_bytes(&key)
                        .map_err(|err| anyhow!("relay identity key rejected: {err}"))?,
                )
            }
        };

        Ok(Self {
            http,
            url: cfg.url.clone(),
            identity,
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("relay not configured"))?;
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [params],
        });
        let payload = serde_json::to_string(&body)?;
        let signature = self.sign_payload(&payload).await?;
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Flashbots-Signature", signature)
            .body(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("relay returned http {status}"));
        }
        Ok(response.json().await?)
    }

    async fn sign_payload(&self, payload: &str) -> Result<String> {
        let signer = self
            .identity
            .as_ref()
            .ok_or_else(|| anyhow!("relay identity key missing"))?;
        let digest = keccak256(payload.as_bytes());
        let message = format!("0x{}", hex::encode(digest));
        let signature = signer.sign_message(message.as_bytes()).await?;
        Ok(format!(
            "{}:0x{}",
            signer.address(),
            hex::encode(signature.as_bytes())
        ))
    }

    fn bundle_params(bundle: &Bundle) -> Value {
        let txs: Vec<String> = bundle
            .txs
            .iter()
            .map(|raw| format!("0x{}", hex::encode(raw)))
            .collect();
        json!({
            "txs": txs,
            "blockNumber": format!("0x{:x}", bundle.target_block),
            "stateBlockNumber": "latest",
        })
    }
}

#[async_trait]
impl BundleRelay for RelayClient {
    fn is_available(&self) -> bool {
        self.url.is_some() && self.identity.is_some()
    }

    async fn simulate_bundle(&self, bundle: &Bundle) -> Result<BundleSimReport> {
        let value = self
            .request("eth_callBundle", Self::bundle_params(bundle))
            .await?;
        if let Some(err) = value.get("error") {
            return Ok(BundleSimReport {
                success: false,
                error: Some(err.to_string()),
            });
        }
        // per-tx reverts come back as entries with an "error" field
        if let Some(results) = value
            .pointer("/result/results")
            .and_then(Value::as_array)
        {
            for (index, entry) in results.iter().enumerate() {
                if let Some(err) = entry.get("error") {
                    let revert = entry
                        .get("revert")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    return Ok(BundleSimReport {
                        success: false,
                        error: Some(format!("tx {index}: {err} {revert}")),
                    });
                }
            }
        }
        Ok(BundleSimReport {
            success: true,
            error: None,
        })
    }

    async fn submit_bundle(&self, bundle: &Bundle) -> Result<BundleSubmitReport> {
        let value = self
            .request("eth_sendBundle", Self::bundle_params(bundle))
            .await?;
        if let Some(err) = value.get("error") {
            return Ok(BundleSubmitReport {
                success: false,
                bundle_hash: None,
                error: Some(err.to_string()),
            });
        }
        let bundle_hash = value
            .pointer("/result/bundleHash")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(BundleSubmitReport {
            success: true,
            bundle_hash,
            error: None,
        })
    }
}
