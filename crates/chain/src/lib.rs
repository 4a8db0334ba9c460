pub mod channel;
pub mod client;
pub mod fetcher;
pub mod heads;
pub mod metrics;
pub mod pending;
pub mod reconnect;
pub mod txpool;

pub use channel::TrackedReceiver;
pub use client::NodeClient;
pub use fetcher::TxFetcher;
pub use heads::NewHeadStream;
pub use metrics::ChannelMetrics;
pub use pending::{PendingTxStream, SubscribeSupport};
pub use reconnect::ReconnectConfig;
pub use txpool::TxpoolBackfill;
