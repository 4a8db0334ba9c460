use alloy::primitives::{Address, Bytes, B256, U256};

/// An unconfirmed transaction observed from the mempool. Captured once and
/// never mutated; consumers receive shared references from the feed.
#[derive(Debug, Clone)]
pub struct PendingTx {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Set for legacy transactions only.
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub first_seen_ms: u64,
}

impl PendingTx {
    /// The fee rate a competing transaction has to beat, whichever fee
    /// model the observed transaction uses.
    pub fn effective_fee_rate(&self) -> u128 {
        self.gas_price.or(self.max_fee_per_gas).unwrap_or_default()
    }
}
