use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Wraps the executing account's key. Key material is loaded once from
/// the environment at startup; a missing or malformed key prevents the
/// engine from starting.
pub struct BundleSigner {
    wallet: EthereumWallet,
    address: Address,
}

impl BundleSigner {
    pub fn from_env(env_var: &str) -> Result<Self> {
        let raw = std::env::var(env_var)
            .map_err(|_| anyhow!("signer key env var {env_var} is not set"))?;
        let key = B256::from_str(raw.trim().trim_start_matches("0x"))
            .map_err(|_| anyhow!("signer key in {env_var} is not a 32-byte hex string"))?;
        let signer = PrivateKeySigner::from_bytes(&key)
            .map_err(|err| anyhow!("signer key in {env_var} rejected: {err}"))?;
        let address = signer.address();
        Ok(Self {
            wallet: EthereumWallet::from(signer),
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a fully populated request into its raw network encoding.
    pub async fn sign(&self, tx: TransactionRequest) -> Result<Bytes> {
        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|err| anyhow!("signing failed: {err}"))?;
        Ok(envelope.encoded_2718().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, TxKind, U256};

    // the well-known first dev-chain account key
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn load_signer() -> BundleSigner {
        std::env::set_var("RAPTOR_TEST_SIGNER_KEY", TEST_KEY);
        BundleSigner::from_env("RAPTOR_TEST_SIGNER_KEY").unwrap()
    }

    #[test]
    fn derives_address_from_key() {
        let signer = load_signer();
        assert_eq!(
            signer.address(),
            address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[test]
    fn missing_env_is_an_error() {
        assert!(BundleSigner::from_env("RAPTOR_TEST_SIGNER_KEY_MISSING").is_err());
    }

    #[test]
    fn malformed_key_is_an_error() {
        std::env::set_var("RAPTOR_TEST_SIGNER_KEY_BAD", "not-a-key");
        assert!(BundleSigner::from_env("RAPTOR_TEST_SIGNER_KEY_BAD").is_err());
    }

    #[tokio::test]
    async fn signs_complete_request_to_raw_payload() {
        let signer = load_signer();
        let tx = TransactionRequest {
            from: Some(signer.address()),
            to: Some(TxKind::Call(address!(
                "0x1111111111111111111111111111111111111111"
            ))),
            value: Some(U256::from(1u64)),
            nonce: Some(0),
            gas: Some(21_000),
            max_fee_per_gas: Some(50_000_000_000),
            max_priority_fee_per_gas: Some(2_000_000_000),
            chain_id: Some(1),
            ..Default::default()
        };
        let raw = signer.sign(tx).await.unwrap();
        assert!(!raw.is_empty());
        // eip1559 payloads are type-2 typed-transaction envelopes
        assert_eq!(raw[0], 0x02);
    }
}
