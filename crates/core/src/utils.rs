use alloy::primitives::{Address, U256};
use anyhow::anyhow;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn parse_address(s: &str) -> anyhow::Result<Address> {
    Address::from_str(s.trim()).map_err(|e| anyhow!("invalid address {s}: {e}"))
}

pub fn parse_u256_decimal(s: &str) -> anyhow::Result<U256> {
    if let Some(stripped) = s.strip_prefix("0x") {
        Ok(U256::from_str_radix(stripped, 16)?)
    } else {
        Ok(U256::from_str_radix(s, 10)?)
    }
}

pub fn gwei_to_wei(gwei: u64) -> u128 {
    (gwei as u128) * 1_000_000_000u128
}

/// Render a wei amount as a decimal native-token string for logs and
/// notifications. Not suitable for arithmetic.
pub fn fmt_wei_as_native(wei: U256) -> String {
    let one = U256::from(1_000_000_000_000_000_000u128);
    let whole = wei / one;
    let micro = (wei % one) / U256::from(1_000_000_000_000u128);
    format!("{whole}.{:06}", micro.to::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u256_decimal_accepts_both_radixes() {
        assert_eq!(parse_u256_decimal("1000").unwrap(), U256::from(1000u64));
        assert_eq!(parse_u256_decimal("0xff").unwrap(), U256::from(255u64));
    }

    #[test]
    fn fmt_wei_renders_fraction() {
        let wei = U256::from(1_230_000_000_000_000_000u128);
        assert_eq!(fmt_wei_as_native(wei), "1.230000");
        assert_eq!(fmt_wei_as_native(U256::ZERO), "0.000000");
    }

    #[test]
    fn gwei_conversion() {
        assert_eq!(gwei_to_wei(63), 63_000_000_000u128);
    }
}
