use alloy::eips::BlockNumberOrTag;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use anyhow::{anyhow, Result};
use raptor_core::config::FeeConfig;
use raptor_core::utils::{gwei_to_wei, now_ms};
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasMode {
    Eip1559,
    Legacy,
}

impl GasMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eip1559" => Ok(Self::Eip1559),
            "legacy" => Ok(Self::Legacy),
            _ => Err(anyhow!("unsupported fees.gas_mode: {raw}")),
        }
    }
}

/// Clamps and knobs for quote computation. All amounts in wei.
#[derive(Debug, Clone, Copy)]
pub struct FeeSettings {
    pub gas_mode: GasMode,
    pub max_fee_ceiling: u128,
    pub priority_fee_ceiling: u128,
    pub safety_multiplier_bps: u64,
    pub boost_percent: u64,
    pub quote_ttl_ms: u64,
    pub default_max_fee: u128,
    pub default_priority: u128,
    pub read_timeout: Duration,
}

impl FeeSettings {
    pub fn from_config(cfg: &FeeConfig) -> Result<Self> {
        Ok(Self {
            gas_mode: GasMode::parse(&cfg.gas_mode)?,
            max_fee_ceiling: gwei_to_wei(cfg.max_fee_ceiling_gwei),
            priority_fee_ceiling: gwei_to_wei(cfg.priority_fee_ceiling_gwei),
            safety_multiplier_bps: cfg.safety_multiplier_bps,
            boost_percent: cfg.boost_percent,
            quote_ttl_ms: cfg.quote_ttl_ms,
            default_max_fee: gwei_to_wei(cfg.default_max_fee_gwei),
            default_priority: gwei_to_wei(cfg.default_priority_gwei),
            read_timeout: Duration::from_millis(cfg.fee_read_timeout_ms),
        })
    }
}

/// One fee decision. For legacy chains `max_fee_per_gas` carries the gas
/// price and the priority component is zero.
#[derive(Debug, Clone, Copy)]
pub struct FeeQuote {
    pub gas_mode: GasMode,
    pub max_fee_per_gas: u128,
    pub priority_fee_per_gas: u128,
    pub base_fee: Option<u128>,
    pub computed_at_ms: u64,
}

impl FeeQuote {
    /// The rate used for gas-cost accounting.
    pub fn primary_rate(&self) -> u128 {
        self.max_fee_per_gas
    }

    pub fn apply(&self, tx: &mut TransactionRequest) {
        match self.gas_mode {
            GasMode::Eip1559 => {
                tx.max_fee_per_gas = Some(self.max_fee_per_gas);
                tx.max_priority_fee_per_gas = Some(self.priority_fee_per_gas);
            }
            GasMode::Legacy => {
                tx.gas_price = Some(self.max_fee_per_gas);
            }
        }
    }
}

pub fn compute_quote_eip1559(
    settings: &FeeSettings,
    base_fee: u128,
    network_priority: u128,
    now_ms: u64,
) -> FeeQuote {
    let priority = network_priority.min(settings.priority_fee_ceiling);
    let scaled_base =
        base_fee.saturating_mul(settings.safety_multiplier_bps as u128) / 10_000u128;
    let max_fee = scaled_base
        .saturating_add(priority)
        .min(settings.max_fee_ceiling);
    FeeQuote {
        gas_mode: GasMode::Eip1559,
        max_fee_per_gas: max_fee,
        priority_fee_per_gas: priority.min(max_fee),
        base_fee: Some(base_fee),
        computed_at_ms: now_ms,
    }
}

pub fn compute_quote_legacy(
    settings: &FeeSettings,
    network_price: u128,
    now_ms: u64,
) -> FeeQuote {
    let price = network_price
        .saturating_mul(settings.safety_multiplier_bps as u128)
        / 10_000u128;
    FeeQuote {
        gas_mode: GasMode::Legacy,
        max_fee_per_gas: price.min(settings.max_fee_ceiling),
        priority_fee_per_gas: 0,
        base_fee: None,
        computed_at_ms: now_ms,
    }
}

/// Competitive variant for front-running: the priority (or legacy price)
/// component grows by `boost_percent`, still clamped to the fee ceiling.
pub fn boost_quote(settings: &FeeSettings, quote: &FeeQuote) -> FeeQuote {
    let factor = 100u128 + settings.boost_percent as u128;
    match quote.gas_mode {
        GasMode::Eip1559 => {
            let priority = quote
                .priority_fee_per_gas
                .saturating_mul(factor)
                / 100u128;
            let base_component = quote.max_fee_per_gas - quote.priority_fee_per_gas;
            let max_fee = base_component
                .saturating_add(priority)
                .min(settings.max_fee_ceiling);
            FeeQuote {
                max_fee_per_gas: max_fee,
                priority_fee_per_gas: priority.min(max_fee),
                ..*quote
            }
        }
        GasMode::Legacy => {
            let price = quote
                .max_fee_per_gas
                .saturating_mul(factor)
                / 100u128;
            FeeQuote {
                max_fee_per_gas: price.min(settings.max_fee_ceiling),
                ..*quote
            }
        }
    }
}

/// Reads network fee state and produces clamped quotes with a short-lived
/// cache. A failed read degrades to the cached quote, then to the
/// configured defaults; it never errors.
pub struct FeeOracle {
    provider: DynProvider,
    settings: FeeSettings,
    cached: Option<FeeQuote>,
}

impl FeeOracle {
    pub fn new(provider: DynProvider, settings: FeeSettings) -> Self {
        Self {
            provider,
            settings,
            cached: None,
        }
    }

    pub fn settings(&self) -> &FeeSettings {
        &self.settings
    }

    pub async fn quote(&mut self, force_refresh: bool) -> FeeQuote {
        let now = now_ms();
        if !force_refresh {
            if let Some(cached) = self.cached {
                if now.saturating_sub(cached.computed_at_ms) <= self.settings.quote_ttl_ms {
                    return cached;
                }
            }
        }
        match self.read_network(now).await {
            Ok(quote) => {
                self.cached = Some(quote);
                quote
            }
            Err(err) => {
                warn!(?err, "network fee read failed");
                if let Some(cached) = self.cached {
                    if now.saturating_sub(cached.computed_at_ms) <= self.settings.quote_ttl_ms {
                        return cached;
                    }
                }
                self.default_quote(now)
            }
        }
    }

    pub fn boosted(&self, quote: &FeeQuote) -> FeeQuote {
        boost_quote(&self.settings, quote)
    }

    fn default_quote(&self, now: u64) -> FeeQuote {
        match self.settings.gas_mode {
            GasMode::Eip1559 => {
                let max_fee = self.settings.default_max_fee.min(self.settings.max_fee_ceiling);
                FeeQuote {
                    gas_mode: GasMode::Eip1559,
                    max_fee_per_gas: max_fee,
                    priority_fee_per_gas: self
                        .settings
                        .default_priority
                        .min(self.settings.priority_fee_ceiling)
                        .min(max_fee),
                    base_fee: None,
                    computed_at_ms: now,
                }
            }
            GasMode::Legacy => FeeQuote {
                gas_mode: GasMode::Legacy,
                max_fee_per_gas: self.settings.default_max_fee.min(self.settings.max_fee_ceiling),
                priority_fee_per_gas: 0,
                base_fee: None,
                computed_at_ms: now,
            },
        }
    }

    async fn read_network(&self, now: u64) -> Result<FeeQuote> {
        match self.settings.gas_mode {
            GasMode::Eip1559 => {
                let block = timeout(
                    self.settings.read_timeout,
                    self.provider.get_block_by_number(BlockNumberOrTag::Latest),
                )
                .await??
                .ok_or_else(|| anyhow!("latest block unavailable"))?;
                let base_fee = block
                    .header
                    .inner
                    .base_fee_per_gas
                    .ok_or_else(|| anyhow!("latest block carries no base fee"))?
                    as u128;
                let priority = timeout(
                    self.settings.read_timeout,
                    self.provider.get_max_priority_fee_per_gas(),
                )
                .await??;
                Ok(compute_quote_eip1559(&self.settings, base_fee, priority, now))
            }
            GasMode::Legacy => {
                let price = timeout(self.settings.read_timeout, self.provider.get_gas_price())
                    .await??;
                Ok(compute_quote_legacy(&self.settings, price, now))
            }
        }
    }
}
