pub mod abi;
pub mod classifier;
pub mod pool;

pub use classifier::{decode_swap_calldata, Classification, Classifier, SwapCall};
pub use pool::PoolSnapshot;
