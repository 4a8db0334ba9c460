use alloy::primitives::B256;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use lru::LruCache;
use raptor_chain::channel::{tracked_channel, TrackedSender};
use raptor_chain::{
    ChannelMetrics, NodeClient, PendingTxStream, ReconnectConfig, SubscribeSupport, TrackedReceiver,
    TxFetcher, TxpoolBackfill,
};
use raptor_core::config::MempoolConfig;
use raptor_core::dedupe::DedupeCache;
use raptor_core::types::PendingTx;
use raptor_core::utils::now_ms;
use raptor_dex::{Classification, Classifier};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

const OUT_CHANNEL_SIZE: usize = 1_024;
const FETCH_QUEUE_MULTIPLIER: usize = 4;
const FETCH_DRAIN_INTERVAL_MS: u64 = 25;
const STOP_GRACE_MS: u64 = 500;

/// Visibility the feed currently has into the mempool. `Degraded` and
/// `Unavailable` are ongoing recoverable conditions, never startup
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Live ws subscription.
    Streaming,
    /// Subscription unsupported; txpool polling only.
    Degraded,
    /// No mempool visibility at all.
    Unavailable,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Streaming => "streaming",
            FeedStatus::Degraded => "degraded",
            FeedStatus::Unavailable => "unavailable",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => FeedStatus::Streaming,
            1 => FeedStatus::Degraded,
            _ => FeedStatus::Unavailable,
        }
    }

    fn as_u8(&self) -> u8 {
        match self {
            FeedStatus::Streaming => 0,
            FeedStatus::Degraded => 1,
            FeedStatus::Unavailable => 2,
        }
    }
}

/// One newly retained swap, delivered in arrival order.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub tx: Arc<PendingTx>,
    pub classification: Classification,
}

pub type FeedCallback = Arc<dyn Fn(&PendingTx, &Classification) + Send + Sync>;

/// Time-windowed set of retained swap transactions keyed by hash. Every
/// insert triggers a lazy sweep of entries older than the window.
pub struct RetainedStore {
    entries: LruCache<B256, Arc<PendingTx>>,
    window_ms: u64,
}

impl RetainedStore {
    pub fn new(capacity: usize, window_ms: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: LruCache::new(capacity),
            window_ms,
        }
    }

    /// Returns true when the transaction was newly retained.
    pub fn insert(&mut self, tx: Arc<PendingTx>, now_ms: u64) -> bool {
        self.purge(now_ms);
        if self.entries.contains(&tx.hash) {
            return false;
        }
        self.entries.put(tx.hash, tx);
        true
    }

    pub fn purge(&mut self, now_ms: u64) {
        let mut expired = Vec::new();
        for (hash, tx) in self.entries.iter() {
            if now_ms.saturating_sub(tx.first_seen_ms) > self.window_ms {
                expired.push(*hash);
            }
        }
        for hash in expired {
            self.entries.pop(&hash);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.entries
            .iter()
            .map(|(_, tx)| now_ms.saturating_sub(tx.first_seen_ms))
            .max()
    }
}

/// The synchronous heart of the feed: classify, gate on is-swap, retain,
/// notify. Owned exclusively by the pump task; tests drive it directly.
struct FeedCore {
    classifier: Arc<Classifier>,
    store: RetainedStore,
    callbacks: Vec<FeedCallback>,
}

impl FeedCore {
    fn ingest(&mut self, tx: PendingTx, now_ms: u64) -> Option<FeedEvent> {
        let classification = self.classifier.classify(&tx.input, tx.to);
        if !classification.is_swap {
            return None;
        }
        let tx = Arc::new(tx);
        if !self.store.insert(tx.clone(), now_ms) {
            return None;
        }
        for callback in &self.callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| callback(&tx, &classification)));
            if result.is_err() {
                warn!(hash = %tx.hash, "feed callback panicked; continuing");
            }
        }
        Some(FeedEvent { tx, classification })
    }
}

/// Subscribes to pending transactions, classifies every delivery, and
/// retains swaps inside a bounded time window. `start` never fails for
/// lack of mempool visibility; it reports the condition via `status`.
pub struct MempoolFeed {
    cfg: MempoolConfig,
    client: NodeClient,
    classifier: Arc<Classifier>,
    callbacks: Vec<FeedCallback>,
    status: Arc<AtomicU8>,
    task: Option<JoinHandle<()>>,
    pending_metrics: Option<ChannelMetrics>,
    txpool_metrics: Option<ChannelMetrics>,
}

impl MempoolFeed {
    pub fn new(cfg: MempoolConfig, client: NodeClient, classifier: Arc<Classifier>) -> Self {
        Self {
            cfg,
            client,
            classifier,
            callbacks: Vec::new(),
            status: Arc::new(AtomicU8::new(FeedStatus::Unavailable.as_u8())),
            task: None,
            pending_metrics: None,
            txpool_metrics: None,
        }
    }

    pub fn with_metrics(
        mut self,
        pending: Option<ChannelMetrics>,
        txpool: Option<ChannelMetrics>,
    ) -> Self {
        self.pending_metrics = pending;
        self.txpool_metrics = txpool;
        self
    }

    /// Callbacks registered before `start` run once per newly retained
    /// transaction. Panics inside a callback are caught and logged.
    pub fn register(&mut self, callback: FeedCallback) {
        self.callbacks.push(callback);
    }

    pub fn status(&self) -> FeedStatus {
        FeedStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub async fn start(&mut self) -> anyhow::Result<TrackedReceiver<FeedEvent>> {
        let reconnect = ReconnectConfig::new(
            self.cfg.ws_reconnect_base_ms,
            self.cfg.ws_reconnect_max_ms,
        );
        let (pending_rx, support) = PendingTxStream::new(
            self.client.ws.clone(),
            self.cfg.fetch_concurrency.max(1) * FETCH_QUEUE_MULTIPLIER,
            reconnect,
            self.pending_metrics.clone(),
        )
        .spawn()
        .await?;

        let want_txpool = self.cfg.mode.contains("txpool");
        let use_txpool = want_txpool || support == SubscribeSupport::Unsupported;
        let txpool_rx = if use_txpool {
            Some(
                TxpoolBackfill::new(
                    self.client.http.clone(),
                    self.cfg.txpool_poll_ms,
                    OUT_CHANNEL_SIZE,
                    self.txpool_metrics.clone(),
                )
                .spawn()
                .await?,
            )
        } else {
            None
        };

        let status = match (support, txpool_rx.is_some()) {
            (SubscribeSupport::Supported, _) => FeedStatus::Streaming,
            (SubscribeSupport::Unsupported, true) => FeedStatus::Degraded,
            (SubscribeSupport::Unsupported, false) => FeedStatus::Unavailable,
        };
        self.status.store(status.as_u8(), Ordering::SeqCst);
        info!(status = status.as_str(), "mempool feed starting");

        let (out_tx, out_rx) = tracked_channel(OUT_CHANNEL_SIZE, None);
        let core = FeedCore {
            classifier: self.classifier.clone(),
            store: RetainedStore::new(self.cfg.retained_capacity, self.cfg.retention_window_ms),
            callbacks: self.callbacks.clone(),
        };
        let fetcher = TxFetcher::new(self.client.http.clone(), self.cfg.tx_fetch_timeout_ms);
        let dedupe = DedupeCache::new(self.cfg.dedup_capacity, self.cfg.dedup_ttl_ms);
        let fetch_limit = self.cfg.fetch_concurrency.max(1);

        self.task = Some(tokio::spawn(pump(
            core, fetcher, dedupe, pending_rx, txpool_rx, out_tx, fetch_limit,
        )));
        Ok(out_rx)
    }

    /// Cancels the subscription pump. Returns within a short grace period
    /// whether or not the task acknowledges the abort.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = timeout(Duration::from_millis(STOP_GRACE_MS), task).await;
        }
        self.status
            .store(FeedStatus::Unavailable.as_u8(), Ordering::SeqCst);
        info!("mempool feed stopped");
    }
}

type FetchFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Option<PendingTx>> + Send>>;

fn spawn_fetch(fetcher: &TxFetcher, hash: B256) -> FetchFuture {
    let fetcher = fetcher.clone();
    Box::pin(async move {
        match fetcher.fetch(hash).await {
            Ok(tx) => tx,
            Err(err) => {
                warn!(?err, %hash, "tx fetch failed");
                None
            }
        }
    })
}

async fn pump(
    mut core: FeedCore,
    fetcher: TxFetcher,
    mut dedupe: DedupeCache<B256>,
    mut pending_rx: TrackedReceiver<B256>,
    mut txpool_rx: Option<TrackedReceiver<B256>>,
    out: TrackedSender<FeedEvent>,
    fetch_limit: usize,
) {
    let queue_limit = fetch_limit * FETCH_QUEUE_MULTIPLIER;
    let mut fetch_queue: VecDeque<B256> = VecDeque::new();
    let mut fetch_futures: FuturesUnordered<FetchFuture> = FuturesUnordered::new();
    let mut drain_tick = interval(Duration::from_millis(FETCH_DRAIN_INTERVAL_MS));
    drain_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            Some(hash) = pending_rx.recv() => {
                if dedupe.admit(hash, now_ms()) {
                    if fetch_futures.len() < fetch_limit {
                        fetch_futures.push(spawn_fetch(&fetcher, hash));
                    } else if fetch_queue.len() < queue_limit {
                        fetch_queue.push_back(hash);
                    } else {
                        debug!(%hash, "fetch queue full; dropping hash");
                    }
                }
            }
            Some(hash) = async {
                match txpool_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => None,
                }
            } => {
                if dedupe.admit(hash, now_ms()) {
                    if fetch_futures.len() < fetch_limit {
                        fetch_futures.push(spawn_fetch(&fetcher, hash));
                    } else if fetch_queue.len() < queue_limit {
                        fetch_queue.push_back(hash);
                    } else {
                        debug!(%hash, "fetch queue full; dropping hash");
                    }
                }
            }
            Some(fetched) = fetch_futures.next(), if !fetch_futures.is_empty() => {
                if let Some(tx) = fetched {
                    if let Some(event) = core.ingest(tx, now_ms()) {
                        if out.try_send(event).is_err() {
                            debug!("feed consumer backlogged; event dropped");
                        }
                    }
                }
                while fetch_futures.len() < fetch_limit {
                    let Some(next_hash) = fetch_queue.pop_front() else {
                        break;
                    };
                    fetch_futures.push(spawn_fetch(&fetcher, next_hash));
                }
            }
            _ = drain_tick.tick(), if fetch_futures.is_empty() && !fetch_queue.is_empty() => {
                while fetch_futures.len() < fetch_limit {
                    let Some(next_hash) = fetch_queue.pop_front() else {
                        break;
                    };
                    fetch_futures.push(spawn_fetch(&fetcher, next_hash));
                }
            }
            // all hash sources closed or idle; nothing to poll right now
            else => {
                tokio::time::sleep(Duration::from_millis(FETCH_DRAIN_INTERVAL_MS)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address, Bytes, B256, U256};
    use alloy::sol_types::SolCall;
    use raptor_dex::abi::IUniswapV2Router02;
    use std::sync::atomic::AtomicUsize;

    fn router() -> Address {
        address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d")
    }

    fn classifier() -> Arc<Classifier> {
        Arc::new(Classifier::new([(router(), "X".to_string())]))
    }

    fn swap_input() -> Bytes {
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
        .into()
    }

    fn pending_tx(index: u8, input: Bytes, first_seen_ms: u64) -> PendingTx {
        PendingTx {
            hash: B256::with_last_byte(index),
            from: address!("0x9000000000000000000000000000000000000009"),
            to: Some(router()),
            value: U256::ZERO,
            input,
            nonce: index as u64,
            gas_limit: 200_000,
            gas_price: None,
            max_fee_per_gas: Some(50_000_000_000),
            max_priority_fee_per_gas: Some(2_000_000_000),
            first_seen_ms,
        }
    }

    fn core_with_callbacks(callbacks: Vec<FeedCallback>) -> FeedCore {
        FeedCore {
            classifier: classifier(),
            store: RetainedStore::new(64, 120_000),
            callbacks,
        }
    }

    #[test]
    fn only_swaps_are_retained() {
        let mut core = core_with_callbacks(Vec::new());
        let mut retained = 0;
        for index in 0..25u8 {
            let input = if index < 4 {
                swap_input()
            } else {
                Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])
            };
            if core.ingest(pending_tx(index, input, 1_000), 1_000).is_some() {
                retained += 1;
            }
        }
        assert_eq!(retained, 4);
        assert_eq!(core.store.len(), 4);
    }

    #[test]
    fn duplicate_hash_is_not_redelivered() {
        let mut core = core_with_callbacks(Vec::new());
        assert!(core.ingest(pending_tx(1, swap_input(), 1_000), 1_000).is_some());
        assert!(core.ingest(pending_tx(1, swap_input(), 1_000), 1_100).is_none());
        assert_eq!(core.store.len(), 1);
    }

    #[test]
    fn retention_window_purges_on_insert() {
        let mut store = RetainedStore::new(64, 1_000);
        store.insert(Arc::new(pending_tx(1, swap_input(), 1_000)), 1_000);
        store.insert(Arc::new(pending_tx(2, swap_input(), 1_500)), 1_500);
        // inserting at 2_400 sweeps the entry first seen at 1_000
        store.insert(Arc::new(pending_tx(3, swap_input(), 2_400)), 2_400);
        assert_eq!(store.len(), 2);
        assert!(store.oldest_age_ms(2_400).unwrap() <= 1_000);
    }

    #[test]
    fn retention_invariant_holds_after_any_purge() {
        let mut store = RetainedStore::new(64, 500);
        for index in 0..10u8 {
            let at = 1_000 + index as u64 * 200;
            store.insert(Arc::new(pending_tx(index, swap_input(), at)), at);
            if let Some(age) = store.oldest_age_ms(at) {
                assert!(age <= 500);
            }
        }
    }

    #[test]
    fn callbacks_run_once_per_retained_tx() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let callback: FeedCallback = Arc::new(move |_tx, classification| {
            assert!(classification.is_swap);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let mut core = core_with_callbacks(vec![callback]);
        core.ingest(pending_tx(1, swap_input(), 1_000), 1_000);
        core.ingest(pending_tx(1, swap_input(), 1_000), 1_050);
        core.ingest(pending_tx(2, swap_input(), 1_100), 1_100);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_callback_does_not_poison_the_feed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let bad: FeedCallback = Arc::new(|_tx, _c| panic!("consumer bug"));
        let good: FeedCallback = Arc::new(move |_tx, _c| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let mut core = core_with_callbacks(vec![bad, good]);
        assert!(core.ingest(pending_tx(1, swap_input(), 1_000), 1_000).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
