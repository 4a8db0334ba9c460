use alloy::primitives::U256;
use raptor_executor::bundle::{SubmissionResult, RELAY_PRIVATE, RELAY_PUBLIC_FALLBACK};
use tracing::info;

const SUMMARY_INTERVAL_MS: u64 = 30_000;

#[derive(Default, Clone, Copy)]
pub struct Counters {
    pub swaps_offered: u64,
    pub opportunities_priced: u64,
    pub aborted: u64,
    pub adjusted: u64,
    pub bundles_attempted: u64,
    pub bundles_confirmed_private: u64,
    pub bundles_fallback: u64,
    pub bundles_failed: u64,
}

impl Counters {
    fn delta(&self, previous: &Counters) -> Counters {
        Counters {
            swaps_offered: self.swaps_offered.saturating_sub(previous.swaps_offered),
            opportunities_priced: self
                .opportunities_priced
                .saturating_sub(previous.opportunities_priced),
            aborted: self.aborted.saturating_sub(previous.aborted),
            adjusted: self.adjusted.saturating_sub(previous.adjusted),
            bundles_attempted: self
                .bundles_attempted
                .saturating_sub(previous.bundles_attempted),
            bundles_confirmed_private: self
                .bundles_confirmed_private
                .saturating_sub(previous.bundles_confirmed_private),
            bundles_fallback: self
                .bundles_fallback
                .saturating_sub(previous.bundles_fallback),
            bundles_failed: self.bundles_failed.saturating_sub(previous.bundles_failed),
        }
    }
}

/// Read-only view handed to callers outside the engine.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub bundles_attempted: u64,
    pub bundles_confirmed_private: u64,
    pub bundles_fallback: u64,
    pub bundles_failed: u64,
    pub total_fees_spent: U256,
    pub total_tips_paid: U256,
}

pub struct EngineStats {
    pub totals: Counters,
    last: Counters,
    last_log_ms: u64,
    total_fees_spent: U256,
    total_tips_paid: U256,
}

impl EngineStats {
    pub fn new(now_ms: u64) -> Self {
        Self {
            totals: Counters::default(),
            last: Counters::default(),
            last_log_ms: now_ms,
            total_fees_spent: U256::ZERO,
            total_tips_paid: U256::ZERO,
        }
    }

    pub fn record_submission(
        &mut self,
        result: &SubmissionResult,
        fees_spent: U256,
        tip: Option<U256>,
    ) {
        self.totals.bundles_attempted += 1;
        if result.success {
            match result.relay_used {
                RELAY_PRIVATE => self.totals.bundles_confirmed_private += 1,
                RELAY_PUBLIC_FALLBACK => self.totals.bundles_fallback += 1,
                _ => {}
            }
            self.total_fees_spent += fees_spent;
            if let Some(tip) = tip {
                self.total_tips_paid += tip;
            }
        } else {
            self.totals.bundles_failed += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bundles_attempted: self.totals.bundles_attempted,
            bundles_confirmed_private: self.totals.bundles_confirmed_private,
            bundles_fallback: self.totals.bundles_fallback,
            bundles_failed: self.totals.bundles_failed,
            total_fees_spent: self.total_fees_spent,
            total_tips_paid: self.total_tips_paid,
        }
    }

    pub fn maybe_log(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_log_ms) < SUMMARY_INTERVAL_MS {
            return;
        }
        let delta = self.totals.delta(&self.last);
        self.last = self.totals;
        self.last_log_ms = now_ms;
        info!(
            swaps = delta.swaps_offered,
            priced = delta.opportunities_priced,
            aborted = delta.aborted,
            adjusted = delta.adjusted,
            attempted = delta.bundles_attempted,
            confirmed_private = delta.bundles_confirmed_private,
            fallback = delta.bundles_fallback,
            failed = delta.bundles_failed,
            "counter summary (last 30s)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, relay_used: &'static str) -> SubmissionResult {
        SubmissionResult {
            success,
            relay_used,
            id: None,
            error: None,
            failed_tx_index: None,
            elapsed_ms: 5,
        }
    }

    #[test]
    fn submission_outcomes_bucket_correctly() {
        let mut stats = EngineStats::new(0);
        stats.record_submission(
            &result(true, RELAY_PRIVATE),
            U256::from(100u64),
            Some(U256::from(10u64)),
        );
        stats.record_submission(&result(true, RELAY_PUBLIC_FALLBACK), U256::from(50u64), None);
        stats.record_submission(&result(false, RELAY_PRIVATE), U256::ZERO, None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bundles_attempted, 3);
        assert_eq!(snapshot.bundles_confirmed_private, 1);
        assert_eq!(snapshot.bundles_fallback, 1);
        assert_eq!(snapshot.bundles_failed, 1);
        assert_eq!(snapshot.total_fees_spent, U256::from(150u64));
        assert_eq!(snapshot.total_tips_paid, U256::from(10u64));
    }

    #[test]
    fn failed_submissions_spend_nothing() {
        let mut stats = EngineStats::new(0);
        stats.record_submission(&result(false, RELAY_PUBLIC_FALLBACK), U256::ZERO, None);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_fees_spent, U256::ZERO);
        assert_eq!(snapshot.bundles_failed, 1);
    }

    #[test]
    fn delta_resets_between_summaries() {
        let mut stats = EngineStats::new(0);
        stats.totals.swaps_offered = 10;
        stats.maybe_log(SUMMARY_INTERVAL_MS + 1);
        let delta = stats.totals.delta(&stats.last);
        assert_eq!(delta.swaps_offered, 0);
    }
}
