use crate::abi::IUniswapV2Router02;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const UNCLASSIFIED: &str = "unclassified";

/// What a pending transaction is doing, derived purely from its selector
/// and recipient. Recomputed on demand, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub selector: [u8; 4],
    pub name: &'static str,
    pub is_swap: bool,
    pub exchange: Option<String>,
}

struct FunctionEntry {
    name: &'static str,
    is_swap: bool,
}

static FUNCTION_TABLE: Lazy<HashMap<[u8; 4], FunctionEntry>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut add = |selector: [u8; 4], name: &'static str, is_swap: bool| {
        table.insert(selector, FunctionEntry { name, is_swap });
    };
    add(
        IUniswapV2Router02::swapExactTokensForTokensCall::SELECTOR,
        "swapExactTokensForTokens",
        true,
    );
    add(
        IUniswapV2Router02::swapTokensForExactTokensCall::SELECTOR,
        "swapTokensForExactTokens",
        true,
    );
    add(
        IUniswapV2Router02::swapExactETHForTokensCall::SELECTOR,
        "swapExactETHForTokens",
        true,
    );
    add(
        IUniswapV2Router02::swapTokensForExactETHCall::SELECTOR,
        "swapTokensForExactETH",
        true,
    );
    add(
        IUniswapV2Router02::swapExactTokensForETHCall::SELECTOR,
        "swapExactTokensForETH",
        true,
    );
    add(
        IUniswapV2Router02::swapETHForExactTokensCall::SELECTOR,
        "swapETHForExactTokens",
        true,
    );
    add(
        IUniswapV2Router02::swapExactTokensForTokensSupportingFeeOnTransferTokensCall::SELECTOR,
        "swapExactTokensForTokensSupportingFeeOnTransferTokens",
        true,
    );
    add(
        IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::SELECTOR,
        "swapExactETHForTokensSupportingFeeOnTransferTokens",
        true,
    );
    add(
        IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::SELECTOR,
        "swapExactTokensForETHSupportingFeeOnTransferTokens",
        true,
    );
    add(
        IUniswapV2Router02::addLiquidityCall::SELECTOR,
        "addLiquidity",
        false,
    );
    add(
        IUniswapV2Router02::addLiquidityETHCall::SELECTOR,
        "addLiquidityETH",
        false,
    );
    add(
        IUniswapV2Router02::removeLiquidityCall::SELECTOR,
        "removeLiquidity",
        false,
    );
    add(
        IUniswapV2Router02::removeLiquidityETHCall::SELECTOR,
        "removeLiquidityETH",
        false,
    );
    table
});

/// Selector-table classifier. Lookup cost is independent of table size;
/// unknown selectors classify as [`UNCLASSIFIED`], never an error.
pub struct Classifier {
    exchanges: HashMap<Address, String>,
}

impl Classifier {
    pub fn new(exchanges: impl IntoIterator<Item = (Address, String)>) -> Self {
        Self {
            exchanges: exchanges.into_iter().collect(),
        }
    }

    pub fn classify(&self, input: &[u8], to: Option<Address>) -> Classification {
        let exchange = to.and_then(|addr| self.exchanges.get(&addr).cloned());
        if input.len() < 4 {
            return Classification {
                selector: [0u8; 4],
                name: UNCLASSIFIED,
                is_swap: false,
                exchange,
            };
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&input[..4]);
        match FUNCTION_TABLE.get(&selector) {
            Some(entry) => Classification {
                selector,
                name: entry.name,
                is_swap: entry.is_swap,
                exchange,
            },
            None => Classification {
                selector,
                name: UNCLASSIFIED,
                is_swap: false,
                exchange,
            },
        }
    }
}

/// Decoded swap arguments, enough to price the trade. Native-input
/// variants carry their input amount in the transaction value.
#[derive(Debug, Clone)]
pub enum SwapCall {
    ExactIn {
        amount_in: Option<U256>,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
    ExactOut {
        amount_out: U256,
        amount_in_max: Option<U256>,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    },
}

impl SwapCall {
    pub fn path(&self) -> &[Address] {
        match self {
            SwapCall::ExactIn { path, .. } | SwapCall::ExactOut { path, .. } => path,
        }
    }

    /// The input amount the victim commits, given the transaction value
    /// for native-input variants. `None` for exact-out swaps, whose input
    /// is only bounded, not fixed.
    pub fn committed_amount_in(&self, tx_value: U256) -> Option<U256> {
        match self {
            SwapCall::ExactIn { amount_in, .. } => Some((*amount_in).unwrap_or(tx_value)),
            SwapCall::ExactOut { .. } => None,
        }
    }
}

pub fn decode_swap_calldata(input: &[u8]) -> Result<Option<SwapCall>> {
    if input.len() < 4 {
        return Ok(None);
    }

    let selector = &input[..4];
    if selector == IUniswapV2Router02::swapExactTokensForTokensCall::SELECTOR {
        let call = IUniswapV2Router02::swapExactTokensForTokensCall::abi_decode(input)?;
        return Ok(Some(SwapCall::ExactIn {
            amount_in: Some(call.amountIn),
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector == IUniswapV2Router02::swapExactTokensForETHCall::SELECTOR {
        let call = IUniswapV2Router02::swapExactTokensForETHCall::abi_decode(input)?;
        return Ok(Some(SwapCall::ExactIn {
            amount_in: Some(call.amountIn),
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector == IUniswapV2Router02::swapExactETHForTokensCall::SELECTOR {
        let call = IUniswapV2Router02::swapExactETHForTokensCall::abi_decode(input)?;
        return Ok(Some(SwapCall::ExactIn {
            amount_in: None,
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector
        == IUniswapV2Router02::swapExactTokensForTokensSupportingFeeOnTransferTokensCall::SELECTOR
    {
        let call =
            IUniswapV2Router02::swapExactTokensForTokensSupportingFeeOnTransferTokensCall::abi_decode(
                input,
            )?;
        return Ok(Some(SwapCall::ExactIn {
            amount_in: Some(call.amountIn),
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector
        == IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::SELECTOR
    {
        let call =
            IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::abi_decode(
                input,
            )?;
        return Ok(Some(SwapCall::ExactIn {
            amount_in: None,
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector
        == IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::SELECTOR
    {
        let call =
            IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::abi_decode(
                input,
            )?;
        return Ok(Some(SwapCall::ExactIn {
            amount_in: Some(call.amountIn),
            amount_out_min: call.amountOutMin,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector == IUniswapV2Router02::swapTokensForExactTokensCall::SELECTOR {
        let call = IUniswapV2Router02::swapTokensForExactTokensCall::abi_decode(input)?;
        return Ok(Some(SwapCall::ExactOut {
            amount_out: call.amountOut,
            amount_in_max: Some(call.amountInMax),
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector == IUniswapV2Router02::swapTokensForExactETHCall::SELECTOR {
        let call = IUniswapV2Router02::swapTokensForExactETHCall::abi_decode(input)?;
        return Ok(Some(SwapCall::ExactOut {
            amount_out: call.amountOut,
            amount_in_max: Some(call.amountInMax),
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    if selector == IUniswapV2Router02::swapETHForExactTokensCall::SELECTOR {
        let call = IUniswapV2Router02::swapETHForExactTokensCall::abi_decode(input)?;
        return Ok(Some(SwapCall::ExactOut {
            amount_out: call.amountOut,
            amount_in_max: None,
            path: call.path,
            to: call.to,
            deadline: call.deadline,
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};
    use alloy::sol_types::SolCall;

    fn router() -> Address {
        address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d")
    }

    fn classifier() -> Classifier {
        Classifier::new([(router(), "X".to_string())])
    }

    fn swap_input() -> Vec<u8> {
        IUniswapV2Router02::swapExactTokensForTokensCall {
            amountIn: U256::from(1_000u64),
            amountOutMin: U256::from(900u64),
            path: vec![
                address!("0x1000000000000000000000000000000000000001"),
                address!("0x2000000000000000000000000000000000000002"),
            ],
            to: address!("0x3000000000000000000000000000000000000003"),
            deadline: U256::from(123u64),
        }
        .abi_encode()
    }

    #[test]
    fn classifies_known_swap_on_known_exchange() {
        let input = swap_input();
        let classification = classifier().classify(&input, Some(router()));
        assert_eq!(classification.selector, [0x38, 0xed, 0x17, 0x39]);
        assert_eq!(classification.name, "swapExactTokensForTokens");
        assert!(classification.is_swap);
        assert_eq!(classification.exchange.as_deref(), Some("X"));
    }

    #[test]
    fn classification_is_idempotent() {
        let input = swap_input();
        let classifier = classifier();
        let first = classifier.classify(&input, Some(router()));
        let second = classifier.classify(&input, Some(router()));
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_selector_is_unclassified() {
        let input = [0xde, 0xad, 0xbe, 0xef, 0x00];
        let classification = classifier().classify(&input, Some(router()));
        assert_eq!(classification.name, UNCLASSIFIED);
        assert!(!classification.is_swap);
        assert_eq!(classification.exchange.as_deref(), Some("X"));
    }

    #[test]
    fn short_input_is_unclassified() {
        let classification = classifier().classify(&[0x38], None);
        assert_eq!(classification.name, UNCLASSIFIED);
        assert!(!classification.is_swap);
    }

    #[test]
    fn unknown_recipient_has_no_exchange() {
        let input = swap_input();
        let classification = classifier()
            .classify(&input, Some(address!("0x4000000000000000000000000000000000000004")));
        assert!(classification.is_swap);
        assert!(classification.exchange.is_none());
    }

    #[test]
    fn liquidity_calls_are_not_swaps() {
        let input = IUniswapV2Router02::addLiquidityCall {
            tokenA: address!("0x1000000000000000000000000000000000000001"),
            tokenB: address!("0x2000000000000000000000000000000000000002"),
            amountADesired: U256::from(1u64),
            amountBDesired: U256::from(1u64),
            amountAMin: U256::ZERO,
            amountBMin: U256::ZERO,
            to: address!("0x3000000000000000000000000000000000000003"),
            deadline: U256::from(1u64),
        }
        .abi_encode();
        let classification = classifier().classify(&input, Some(router()));
        assert_eq!(classification.name, "addLiquidity");
        assert!(!classification.is_swap);
    }

    #[test]
    fn decode_exact_in_swap() {
        let decoded = decode_swap_calldata(&swap_input()).unwrap().unwrap();
        match decoded {
            SwapCall::ExactIn {
                amount_in,
                amount_out_min,
                path,
                ..
            } => {
                assert_eq!(amount_in, Some(U256::from(1_000u64)));
                assert_eq!(amount_out_min, U256::from(900u64));
                assert_eq!(path.len(), 2);
            }
            _ => panic!("unexpected decode"),
        }
    }

    #[test]
    fn decode_native_in_swap_takes_value() {
        let input = IUniswapV2Router02::swapExactETHForTokensCall {
            amountOutMin: U256::from(500u64),
            path: vec![
                address!("0x1000000000000000000000000000000000000001"),
                address!("0x2000000000000000000000000000000000000002"),
            ],
            to: address!("0x3000000000000000000000000000000000000003"),
            deadline: U256::from(123u64),
        }
        .abi_encode();
        let decoded = decode_swap_calldata(&input).unwrap().unwrap();
        assert_eq!(
            decoded.committed_amount_in(U256::from(7_777u64)),
            Some(U256::from(7_777u64))
        );
    }

    #[test]
    fn exact_out_swap_has_no_committed_input() {
        let input = IUniswapV2Router02::swapTokensForExactTokensCall {
            amountOut: U256::from(100u64),
            amountInMax: U256::from(120u64),
            path: vec![
                address!("0x1000000000000000000000000000000000000001"),
                address!("0x2000000000000000000000000000000000000002"),
            ],
            to: address!("0x3000000000000000000000000000000000000003"),
            deadline: U256::from(123u64),
        }
        .abi_encode();
        let decoded = decode_swap_calldata(&input).unwrap().unwrap();
        assert_eq!(decoded.committed_amount_in(U256::ZERO), None);
    }

    #[test]
    fn non_swap_calldata_decodes_to_none() {
        assert!(decode_swap_calldata(&[0xde, 0xad, 0xbe, 0xef]).unwrap().is_none());
    }
}
