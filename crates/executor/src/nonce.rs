use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider};
use anyhow::Result;
use raptor_core::utils::now_ms;

/// In-memory lease over one account's sequence numbers. Pure bookkeeping;
/// the allocator decides when to trust it.
#[derive(Debug, Clone, Copy)]
struct LeaseState {
    next: u64,
    issued_at_ms: u64,
}

impl LeaseState {
    fn take(&mut self, now_ms: u64, ttl_ms: u64) -> Option<u64> {
        if now_ms.saturating_sub(self.issued_at_ms) > ttl_ms {
            return None;
        }
        let value = self.next;
        self.next += 1;
        Some(value)
    }
}

/// Issues strictly increasing nonces for one account. The common path is
/// an optimistic in-memory increment; a lapsed lease or a forced refresh
/// re-seeds from the chain's pending count. Single writer per account.
pub struct NonceAllocator {
    provider: DynProvider,
    account: Address,
    lease_ttl_ms: u64,
    lease: Option<LeaseState>,
}

impl NonceAllocator {
    pub fn new(provider: DynProvider, account: Address, lease_ttl_ms: u64) -> Self {
        Self {
            provider,
            account,
            lease_ttl_ms,
            lease: None,
        }
    }

    /// Callers MUST pass `force_refresh = true` before retrying after a
    /// submission failure attributable to a stale nonce.
    pub async fn next(&mut self, force_refresh: bool) -> Result<u64> {
        if !force_refresh {
            let now = now_ms();
            if let Some(lease) = &mut self.lease {
                if let Some(value) = lease.take(now, self.lease_ttl_ms) {
                    return Ok(value);
                }
            }
        }
        self.resync().await
    }

    /// Re-seeds the lease from the chain and issues the first value.
    pub async fn resync(&mut self) -> Result<u64> {
        let value = self
            .provider
            .get_transaction_count(self.account)
            .pending()
            .await?;
        self.lease = Some(LeaseState {
            next: value + 1,
            issued_at_ms: now_ms(),
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::LeaseState;

    #[test]
    fn lease_issues_consecutive_values() {
        let mut lease = LeaseState {
            next: 7,
            issued_at_ms: 1_000,
        };
        assert_eq!(lease.take(1_100, 2_000), Some(7));
        assert_eq!(lease.take(1_200, 2_000), Some(8));
        assert_eq!(lease.take(1_300, 2_000), Some(9));
    }

    #[test]
    fn lapsed_lease_is_not_trusted() {
        let mut lease = LeaseState {
            next: 7,
            issued_at_ms: 1_000,
        };
        assert_eq!(lease.take(3_001, 2_000), None);
        // the lease stays untouched; only a resync replaces it
        assert_eq!(lease.next, 7);
    }

    #[test]
    fn lease_age_measured_from_issue_not_last_use() {
        let mut lease = LeaseState {
            next: 0,
            issued_at_ms: 1_000,
        };
        assert_eq!(lease.take(2_900, 2_000), Some(0));
        assert_eq!(lease.take(3_100, 2_000), None);
    }
}
