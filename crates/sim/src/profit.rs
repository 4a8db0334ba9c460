use alloy::primitives::U256;

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Decision for one opportunity. `Adjust` means the margin exists but is
/// thin; the caller may re-quote with a higher boost or walk away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Execute,
    Adjust,
    Abort,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Execute => "execute",
            Recommendation::Adjust => "adjust",
            Recommendation::Abort => "abort",
        }
    }
}

/// Constant-product output for a single hop, net of the pool fee.
pub fn constant_product_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u32,
) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    let keep = U256::from(BPS_DENOMINATOR - fee_bps as u64);
    let in_with_fee = amount_in * keep;
    let numerator = in_with_fee * reserve_out;
    let denominator = reserve_in * U256::from(BPS_DENOMINATOR) + in_with_fee;
    numerator / denominator
}

/// Gross capture of a full sandwich: buy ahead of the victim, let the
/// victim move the price, sell back into the shifted pool. Reserves are
/// oriented to the victim's trade direction.
pub fn sandwich_gross_profit(
    attack_in: U256,
    victim_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u32,
) -> U256 {
    let front_out = constant_product_out(attack_in, reserve_in, reserve_out, fee_bps);
    if front_out.is_zero() {
        return U256::ZERO;
    }
    let r_in = reserve_in + attack_in;
    let r_out = reserve_out - front_out;

    let victim_out = constant_product_out(victim_in, r_in, r_out, fee_bps);
    let r_in = r_in + victim_in;
    let r_out = r_out - victim_out;

    let back_out = constant_product_out(front_out, r_out, r_in, fee_bps);
    back_out.saturating_sub(attack_in)
}

/// Gross capture of buying on the cheap venue and selling on the rich
/// one. Each leg's reserves are oriented to that leg's direction.
pub fn arbitrage_gross_profit(
    amount_in: U256,
    buy_reserves: (U256, U256),
    sell_reserves: (U256, U256),
    fee_bps: u32,
) -> U256 {
    let bridged = constant_product_out(amount_in, buy_reserves.0, buy_reserves.1, fee_bps);
    let out = constant_product_out(bridged, sell_reserves.0, sell_reserves.1, fee_bps);
    out.saturating_sub(amount_in)
}

pub fn gas_cost(gas_used: u64, fee_rate_wei: u128) -> U256 {
    U256::from(gas_used) * U256::from(fee_rate_wei)
}

/// Net profit and the decision it implies. Net is zero when the gross
/// does not cover gas.
pub fn recommend(gross: U256, cost: U256, threshold: U256) -> (U256, Recommendation) {
    if gross <= cost {
        return (U256::ZERO, Recommendation::Abort);
    }
    let net = gross - cost;
    if net > threshold {
        (net, Recommendation::Execute)
    } else {
        (net, Recommendation::Adjust)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000_000_000_000u128)
    }

    #[test]
    fn constant_product_charges_pool_fee() {
        // 1:1 pool, small trade: output just under input
        let out = constant_product_out(eth(1), eth(1_000), eth(1_000), 30);
        assert!(out < eth(1));
        assert!(out > eth(1) * U256::from(99u64) / U256::from(100u64));
    }

    #[test]
    fn constant_product_empty_pool_is_zero() {
        assert_eq!(
            constant_product_out(eth(1), U256::ZERO, eth(1_000), 30),
            U256::ZERO
        );
    }

    #[test]
    fn sandwich_profits_from_large_victim() {
        let gross = sandwich_gross_profit(eth(5), eth(100), eth(1_000), eth(1_000), 30);
        assert!(gross > U256::ZERO);
    }

    #[test]
    fn sandwich_on_dust_victim_loses_fees() {
        let gross = sandwich_gross_profit(
            eth(5),
            U256::from(1_000u64),
            eth(1_000),
            eth(1_000),
            30,
        );
        assert_eq!(gross, U256::ZERO);
    }

    #[test]
    fn arbitrage_captures_cross_venue_spread() {
        // venue A prices the token at half of venue B
        let gross = arbitrage_gross_profit(
            eth(1),
            (eth(1_000), eth(2_000)),
            (eth(1_000), eth(1_000)),
            30,
        );
        assert!(gross > U256::ZERO);
    }

    #[test]
    fn arbitrage_on_aligned_venues_is_zero() {
        let gross = arbitrage_gross_profit(
            eth(1),
            (eth(1_000), eth(1_000)),
            (eth(1_000), eth(1_000)),
            30,
        );
        assert_eq!(gross, U256::ZERO);
    }

    #[test]
    fn recommend_execute_above_threshold() {
        // gross 0.02, gas 100_000 at 100 gwei -> cost 0.01, net 0.01
        let gross = U256::from(20_000_000_000_000_000u128);
        let cost = gas_cost(100_000, 100_000_000_000u128);
        assert_eq!(cost, U256::from(10_000_000_000_000_000u128));
        let threshold = U256::from(5_000_000_000_000_000u128);
        let (net, rec) = recommend(gross, cost, threshold);
        assert_eq!(net, U256::from(10_000_000_000_000_000u128));
        assert_eq!(rec, Recommendation::Execute);
    }

    #[test]
    fn recommend_adjust_in_thin_margin() {
        let (net, rec) = recommend(U256::from(100u64), U256::from(90u64), U256::from(50u64));
        assert_eq!(net, U256::from(10u64));
        assert_eq!(rec, Recommendation::Adjust);
    }

    #[test]
    fn recommend_abort_when_gas_eats_gross() {
        let (net, rec) = recommend(U256::from(100u64), U256::from(100u64), U256::ZERO);
        assert_eq!(net, U256::ZERO);
        assert_eq!(rec, Recommendation::Abort);
    }
}
