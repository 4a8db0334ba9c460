pub mod bundle;
pub mod fees;
pub mod nonce;
pub mod relay;
pub mod sender;
pub mod signer;

pub use bundle::{Bundle, BundleSubmitter, SubmissionResult, SubmitterSettings};
pub use fees::{FeeOracle, FeeQuote, FeeSettings, GasMode};
pub use nonce::NonceAllocator;
pub use relay::{BundleRelay, RelayClient};
pub use sender::{Broadcaster, TxSender};
pub use signer::BundleSigner;
