use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    pub mempool: MempoolConfig,
    pub dex: DexConfig,
    pub fees: FeeConfig,
    pub profit: ProfitConfig,
    pub relay: RelayConfig,
    pub executor: ExecutorConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_http: String,
    pub rpc_ws: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// "ws", "txpool", or "ws+txpool".
    pub mode: String,
    #[serde(default = "default_txpool_poll_ms")]
    pub txpool_poll_ms: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_tx_fetch_timeout_ms")]
    pub tx_fetch_timeout_ms: u64,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_dedup_ttl_ms")]
    pub dedup_ttl_ms: u64,
    #[serde(default = "default_ws_reconnect_base_ms")]
    pub ws_reconnect_base_ms: u64,
    #[serde(default = "default_ws_reconnect_max_ms")]
    pub ws_reconnect_max_ms: u64,
    #[serde(default = "default_retention_window_ms")]
    pub retention_window_ms: u64,
    #[serde(default = "default_retained_capacity")]
    pub retained_capacity: usize,
}

/// One exchange venue the engine watches and trades against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    pub router: String,
    pub factory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DexConfig {
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
    pub wrapped_native: String,
    #[serde(default = "default_swap_fee_bps")]
    pub swap_fee_bps: u32,
    #[serde(default = "default_reserve_read_timeout_ms")]
    pub reserve_read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// "eip1559" or "legacy".
    #[serde(default = "default_gas_mode")]
    pub gas_mode: String,
    pub max_fee_ceiling_gwei: u64,
    pub priority_fee_ceiling_gwei: u64,
    #[serde(default = "default_safety_multiplier_bps")]
    pub safety_multiplier_bps: u64,
    #[serde(default = "default_boost_percent")]
    pub boost_percent: u64,
    #[serde(default = "default_quote_ttl_ms")]
    pub quote_ttl_ms: u64,
    /// Conservative fallback used when the network fee read fails and no
    /// cached quote is fresh enough.
    pub default_max_fee_gwei: u64,
    #[serde(default = "default_default_priority_gwei")]
    pub default_priority_gwei: u64,
    #[serde(default = "default_fee_read_timeout_ms")]
    pub fee_read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitConfig {
    /// Wei. Net profit must exceed this for an execute recommendation.
    pub min_profit_threshold_wei: String,
    /// Wei committed to the attack leg of a front-run or sandwich.
    pub attack_amount_wei: String,
    #[serde(default = "default_sim_timeout_ms")]
    pub sim_timeout_ms: u64,
    /// Extra headroom applied to simulated gas when setting the limit.
    #[serde(default = "default_gas_limit_buffer_bps")]
    pub gas_limit_buffer_bps: u32,
    /// Re-quote once with a higher boost when the recommendation is
    /// "adjust" instead of aborting outright.
    #[serde(default)]
    pub adjust_requote: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Absent URL means no private relay; the protocol then goes straight
    /// to the public path.
    #[serde(default)]
    pub url: Option<String>,
    /// Env var holding the relay identity key. Falls back to the executor
    /// signing key when unset.
    #[serde(default)]
    pub identity_key_env: Option<String>,
    #[serde(default = "default_simulate_before_send")]
    pub simulate_before_send: bool,
    #[serde(default = "default_submission_timeout_ms")]
    pub submission_timeout_ms: u64,
    pub min_tip_wei: String,
    pub max_tip_wei: String,
    #[serde(default = "default_tip_fraction_bps")]
    pub tip_fraction_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub signer_private_key_env: String,
    #[serde(default = "default_nonce_lease_ms")]
    pub nonce_lease_ms: u64,
    #[serde(default = "default_nonce_sync_interval_ms")]
    pub nonce_sync_interval_ms: u64,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("RAPTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let cfg: AppConfig = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that must never reach the engine. Runs at
    /// startup; per-opportunity code can assume these hold.
    pub fn validate(&self) -> Result<()> {
        if self.fees.max_fee_ceiling_gwei == 0 {
            return Err(Error::InvalidConfig(
                "fees.max_fee_ceiling_gwei must be non-zero".into(),
            ));
        }
        if self.fees.priority_fee_ceiling_gwei > self.fees.max_fee_ceiling_gwei {
            return Err(Error::InvalidConfig(
                "fees.priority_fee_ceiling_gwei exceeds max_fee_ceiling_gwei".into(),
            ));
        }
        if self.fees.safety_multiplier_bps < 10_000 {
            return Err(Error::InvalidConfig(
                "fees.safety_multiplier_bps must be at least 10000".into(),
            ));
        }
        if self.relay.tip_fraction_bps > 10_000 {
            return Err(Error::InvalidConfig(
                "relay.tip_fraction_bps must be at most 10000".into(),
            ));
        }
        if self.relay.submission_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "relay.submission_timeout_ms must be non-zero".into(),
            ));
        }
        if self.executor.signer_private_key_env.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "executor.signer_private_key_env must be set".into(),
            ));
        }
        if self.mempool.retention_window_ms == 0 {
            return Err(Error::InvalidConfig(
                "mempool.retention_window_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_txpool_poll_ms() -> u64 {
    750
}

fn default_fetch_concurrency() -> usize {
    32
}

fn default_tx_fetch_timeout_ms() -> u64 {
    2_000
}

fn default_dedup_capacity() -> usize {
    100_000
}

fn default_dedup_ttl_ms() -> u64 {
    60_000
}

fn default_ws_reconnect_base_ms() -> u64 {
    500
}

fn default_ws_reconnect_max_ms() -> u64 {
    30_000
}

fn default_retention_window_ms() -> u64 {
    120_000
}

fn default_retained_capacity() -> usize {
    10_000
}

fn default_swap_fee_bps() -> u32 {
    30
}

fn default_reserve_read_timeout_ms() -> u64 {
    1_500
}

fn default_gas_mode() -> String {
    "eip1559".to_string()
}

fn default_safety_multiplier_bps() -> u64 {
    12_000
}

fn default_boost_percent() -> u64 {
    20
}

fn default_quote_ttl_ms() -> u64 {
    10_000
}

fn default_default_priority_gwei() -> u64 {
    2
}

fn default_fee_read_timeout_ms() -> u64 {
    2_000
}

fn default_sim_timeout_ms() -> u64 {
    3_000
}

fn default_gas_limit_buffer_bps() -> u32 {
    2_000
}

fn default_simulate_before_send() -> bool {
    true
}

fn default_submission_timeout_ms() -> u64 {
    15_000
}

fn default_tip_fraction_bps() -> u32 {
    9_000
}

fn default_nonce_lease_ms() -> u64 {
    2_000
}

fn default_nonce_sync_interval_ms() -> u64 {
    10_000
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            chain: ChainConfig {
                chain_id: 1,
                rpc_http: "http://localhost:8545".into(),
                rpc_ws: "ws://localhost:8546".into(),
            },
            mempool: MempoolConfig {
                mode: "ws".into(),
                txpool_poll_ms: default_txpool_poll_ms(),
                fetch_concurrency: default_fetch_concurrency(),
                tx_fetch_timeout_ms: default_tx_fetch_timeout_ms(),
                dedup_capacity: default_dedup_capacity(),
                dedup_ttl_ms: default_dedup_ttl_ms(),
                ws_reconnect_base_ms: default_ws_reconnect_base_ms(),
                ws_reconnect_max_ms: default_ws_reconnect_max_ms(),
                retention_window_ms: default_retention_window_ms(),
                retained_capacity: default_retained_capacity(),
            },
            dex: DexConfig {
                venues: Vec::new(),
                wrapped_native: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".into(),
                swap_fee_bps: default_swap_fee_bps(),
                reserve_read_timeout_ms: default_reserve_read_timeout_ms(),
            },
            fees: FeeConfig {
                gas_mode: "eip1559".into(),
                max_fee_ceiling_gwei: 80,
                priority_fee_ceiling_gwei: 5,
                safety_multiplier_bps: 12_000,
                boost_percent: 20,
                quote_ttl_ms: default_quote_ttl_ms(),
                default_max_fee_gwei: 40,
                default_priority_gwei: 2,
                fee_read_timeout_ms: default_fee_read_timeout_ms(),
            },
            profit: ProfitConfig {
                min_profit_threshold_wei: "5000000000000000".into(),
                attack_amount_wei: "1000000000000000000".into(),
                sim_timeout_ms: default_sim_timeout_ms(),
                gas_limit_buffer_bps: default_gas_limit_buffer_bps(),
                adjust_requote: false,
            },
            relay: RelayConfig {
                url: Some("https://relay.example.org".into()),
                identity_key_env: None,
                simulate_before_send: true,
                submission_timeout_ms: default_submission_timeout_ms(),
                min_tip_wei: "1000000000000000".into(),
                max_tip_wei: "100000000000000000".into(),
                tip_fraction_bps: 9_000,
            },
            executor: ExecutorConfig {
                signer_private_key_env: "RAPTOR_SIGNER_KEY".into(),
                nonce_lease_ms: default_nonce_lease_ms(),
                nonce_sync_interval_ms: default_nonce_sync_interval_ms(),
                send_timeout_ms: default_send_timeout_ms(),
            },
            observability: ObservabilityConfig {
                metrics_enabled: false,
                metrics_bind: "127.0.0.1:9184".into(),
                log_level: "info".into(),
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn zero_fee_ceiling_is_fatal() {
        let mut cfg = sample();
        cfg.fees.max_fee_ceiling_gwei = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn priority_ceiling_above_max_is_fatal() {
        let mut cfg = sample();
        cfg.fees.priority_fee_ceiling_gwei = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tip_fraction_above_one_is_fatal() {
        let mut cfg = sample();
        cfg.relay.tip_fraction_bps = 10_001;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_signer_env_name_is_fatal() {
        let mut cfg = sample();
        cfg.executor.signer_private_key_env = "  ".into();
        assert!(cfg.validate().is_err());
    }
}
