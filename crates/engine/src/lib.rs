pub mod feed;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod state;
pub mod stats;

pub use feed::{FeedEvent, FeedStatus, MempoolFeed};
pub use orchestrator::Engine;
