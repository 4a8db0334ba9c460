use crate::abi::{IUniswapV2Factory, IUniswapV2Pair};
use alloy::primitives::{Address, TxKind, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::transaction::TransactionInput;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use anyhow::Result;

/// Reserves of one pair, oriented to a trade direction.
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub pair: Address,
    pub reserve_in: U256,
    pub reserve_out: U256,
}

impl PoolSnapshot {
    /// Mid price of `token_out` per `token_in`, scaled by 1e18.
    pub fn implied_price_e18(&self) -> Option<U256> {
        if self.reserve_in.is_zero() {
            return None;
        }
        Some(self.reserve_out * U256::from(10u128.pow(18)) / self.reserve_in)
    }
}

/// Resolves the pair for a trade direction on one venue and loads its
/// reserves oriented as (in, out). `None` when the pair does not exist or
/// is empty.
pub async fn load_pool(
    provider: &DynProvider,
    factory: Address,
    token_in: Address,
    token_out: Address,
) -> Result<Option<PoolSnapshot>> {
    let Some(pair) = get_pair_address(provider, factory, token_in, token_out).await? else {
        return Ok(None);
    };
    let Some((reserve0, reserve1)) = get_reserves(provider, pair).await? else {
        return Ok(None);
    };
    if reserve0.is_zero() || reserve1.is_zero() {
        return Ok(None);
    }
    let (token0, _token1) = sort_tokens(token_in, token_out);
    let (reserve_in, reserve_out) = if token_in == token0 {
        (reserve0, reserve1)
    } else {
        (reserve1, reserve0)
    };
    Ok(Some(PoolSnapshot {
        pair,
        reserve_in,
        reserve_out,
    }))
}

pub async fn get_pair_address(
    provider: &DynProvider,
    factory: Address,
    token_a: Address,
    token_b: Address,
) -> Result<Option<Address>> {
    let call = IUniswapV2Factory::getPairCall {
        tokenA: token_a,
        tokenB: token_b,
    };
    let tx = TransactionRequest {
        to: Some(TxKind::Call(factory)),
        input: TransactionInput::new(call.abi_encode().into()),
        ..Default::default()
    };
    let data = provider.call(tx).await?;
    let ret = IUniswapV2Factory::getPairCall::abi_decode_returns(&data)?;
    if ret == Address::ZERO {
        return Ok(None);
    }
    Ok(Some(ret))
}

pub async fn get_reserves(provider: &DynProvider, pair: Address) -> Result<Option<(U256, U256)>> {
    let call = IUniswapV2Pair::getReservesCall {};
    let tx = TransactionRequest {
        to: Some(TxKind::Call(pair)),
        input: TransactionInput::new(call.abi_encode().into()),
        ..Default::default()
    };
    let data = provider.call(tx).await?;
    let ret = IUniswapV2Pair::getReservesCall::abi_decode_returns(&data)?;
    Ok(Some((U256::from(ret.reserve0), U256::from(ret.reserve1))))
}

fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn implied_price_scales_reserves() {
        let snapshot = PoolSnapshot {
            pair: address!("0x5555555555555555555555555555555555555555"),
            reserve_in: U256::from(2_000u64),
            reserve_out: U256::from(1_000u64),
        };
        assert_eq!(
            snapshot.implied_price_e18(),
            Some(U256::from(500_000_000_000_000_000u128))
        );
    }

    #[test]
    fn implied_price_empty_pool_is_none() {
        let snapshot = PoolSnapshot {
            pair: address!("0x5555555555555555555555555555555555555555"),
            reserve_in: U256::ZERO,
            reserve_out: U256::from(1_000u64),
        };
        assert!(snapshot.implied_price_e18().is_none());
    }

    #[test]
    fn sort_tokens_orders_by_address() {
        let low = address!("0x00000000000000000000000000000000000000aa");
        let high = address!("0x00000000000000000000000000000000000000bb");
        assert_eq!(sort_tokens(high, low), (low, high));
        assert_eq!(sort_tokens(low, high), (low, high));
    }
}
