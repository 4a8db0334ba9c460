use crate::profit::{gas_cost, recommend, Recommendation};
use alloy::primitives::{Bytes, B256, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use std::fmt::Display;
use std::future::IntoFuture;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpportunityKind {
    FrontRun,
    Sandwich,
    Arbitrage,
}

impl OpportunityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityKind::FrontRun => "front-run",
            OpportunityKind::Sandwich => "sandwich",
            OpportunityKind::Arbitrage => "arbitrage",
        }
    }
}

/// Outcome of one dry run. Transport failures and reverts both land here
/// as `success: false`; neither is an error to the caller.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    pub success: bool,
    pub gas_used: u64,
    pub return_data: Option<Bytes>,
    pub error: Option<String>,
}

impl SimOutcome {
    pub fn ok(gas_used: u64, return_data: Bytes) -> Self {
        Self {
            success: true,
            gas_used,
            return_data: Some(return_data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            gas_used: 0,
            return_data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PairSimOutcome {
    pub candidate: SimOutcome,
    pub target: SimOutcome,
}

impl PairSimOutcome {
    pub fn both_succeeded(&self) -> bool {
        self.candidate.success && self.target.success
    }

    pub fn failure_reason(&self) -> Option<String> {
        if !self.candidate.success {
            return Some(format!(
                "candidate simulation failed: {}",
                self.candidate.error.as_deref().unwrap_or("unknown")
            ));
        }
        if !self.target.success {
            return Some(format!(
                "target simulation failed: {}",
                self.target.error.as_deref().unwrap_or("unknown")
            ));
        }
        None
    }
}

/// One decision's worth of pricing. Consumed once by the engine and
/// dropped; callers outside the decision cycle may log it.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub target_hash: B256,
    pub kind: OpportunityKind,
    pub gross_profit: U256,
    pub gas_cost: U256,
    pub net_profit: U256,
    pub recommendation: Recommendation,
    pub reason: Option<String>,
}

impl Opportunity {
    /// Prices an opportunity whose simulations already succeeded.
    pub fn priced(
        target_hash: B256,
        kind: OpportunityKind,
        gross_profit: U256,
        gas_used: u64,
        fee_rate_wei: u128,
        threshold: U256,
    ) -> Self {
        let cost = gas_cost(gas_used, fee_rate_wei);
        let (net, recommendation) = recommend(gross_profit, cost, threshold);
        let reason = match recommendation {
            Recommendation::Execute => None,
            Recommendation::Adjust => Some("net profit within threshold margin".to_string()),
            Recommendation::Abort => Some("gas cost exceeds gross profit".to_string()),
        };
        Self {
            target_hash,
            kind,
            gross_profit,
            gas_cost: cost,
            net_profit: net,
            recommendation,
            reason,
        }
    }

    /// An opportunity killed before pricing (failed simulation, missing
    /// pool, transport trouble). Always an abort.
    pub fn aborted(target_hash: B256, kind: OpportunityKind, reason: impl Into<String>) -> Self {
        Self {
            target_hash,
            kind,
            gross_profit: U256::ZERO,
            gas_cost: U256::ZERO,
            net_profit: U256::ZERO,
            recommendation: Recommendation::Abort,
            reason: Some(reason.into()),
        }
    }
}

/// Dry-runs candidate transactions against current state. Never commits
/// anything; never returns `Err` for a failing transaction.
#[derive(Clone)]
pub struct Simulator {
    provider: DynProvider,
    call_timeout: Duration,
}

impl Simulator {
    pub fn new(provider: DynProvider, timeout_ms: u64) -> Self {
        Self {
            provider,
            call_timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub async fn simulate(&self, tx: &TransactionRequest) -> SimOutcome {
        let data = match self
            .with_timeout("simulate call", self.provider.call(tx.clone()))
            .await
        {
            Ok(data) => data,
            Err(err) => return SimOutcome::failed(err),
        };
        let gas_used = match self
            .with_timeout("estimate gas", self.provider.estimate_gas(tx.clone()))
            .await
        {
            Ok(gas) => gas,
            Err(err) => return SimOutcome::failed(err),
        };
        debug!(gas_used, "simulation succeeded");
        SimOutcome::ok(gas_used, data)
    }

    /// Front-run gating: both the candidate and its target must pass
    /// independently before any capital moves.
    pub async fn simulate_pair(
        &self,
        candidate: &TransactionRequest,
        target: &TransactionRequest,
    ) -> PairSimOutcome {
        let candidate = self.simulate(candidate).await;
        if !candidate.success {
            // no point paying for the second round trip
            return PairSimOutcome {
                candidate,
                target: SimOutcome::failed("skipped: candidate failed"),
            };
        }
        let target = self.simulate(target).await;
        PairSimOutcome { candidate, target }
    }

    async fn with_timeout<T, Fut, E>(&self, label: &str, fut: Fut) -> Result<T, String>
    where
        Fut: IntoFuture<Output = Result<T, E>>,
        E: Display,
    {
        match timeout(self.call_timeout, fut.into_future()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(format!("{label} failed: {err}")),
            Err(_) => Err(format!(
                "{label} timed out after {}ms",
                self.call_timeout.as_millis()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    fn hash() -> B256 {
        b256!("0x0101010101010101010101010101010101010101010101010101010101010101")
    }

    #[test]
    fn priced_opportunity_matches_policy() {
        let opp = Opportunity::priced(
            hash(),
            OpportunityKind::FrontRun,
            U256::from(20_000_000_000_000_000u128),
            100_000,
            100_000_000_000u128,
            U256::from(5_000_000_000_000_000u128),
        );
        assert_eq!(opp.net_profit, U256::from(10_000_000_000_000_000u128));
        assert_eq!(opp.recommendation, Recommendation::Execute);
        assert!(opp.reason.is_none());
    }

    #[test]
    fn unprofitable_opportunity_aborts_with_reason() {
        let opp = Opportunity::priced(
            hash(),
            OpportunityKind::Sandwich,
            U256::from(1_000u64),
            100_000,
            100_000_000_000u128,
            U256::ZERO,
        );
        assert_eq!(opp.recommendation, Recommendation::Abort);
        assert_eq!(opp.net_profit, U256::ZERO);
        assert!(opp.reason.is_some());
    }

    #[test]
    fn pair_outcome_surfaces_failing_side() {
        let pair = PairSimOutcome {
            candidate: SimOutcome::ok(21_000, Bytes::new()),
            target: SimOutcome::failed("execution reverted"),
        };
        assert!(!pair.both_succeeded());
        let reason = pair.failure_reason().unwrap();
        assert!(reason.contains("target"));
        assert!(reason.contains("execution reverted"));
    }

    #[test]
    fn aborted_opportunity_spends_nothing() {
        let opp = Opportunity::aborted(hash(), OpportunityKind::Arbitrage, "pool missing");
        assert_eq!(opp.gas_cost, U256::ZERO);
        assert_eq!(opp.recommendation, Recommendation::Abort);
    }
}
