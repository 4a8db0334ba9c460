use crate::feed::{FeedEvent, MempoolFeed};
use crate::metrics::{spawn_metrics_server, EngineMetrics};
use crate::notifier::TelegramNotifier;
use crate::state::{TargetState, TargetStore};
use crate::stats::{EngineStats, StatsSnapshot};
use alloy::primitives::{Address, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::transaction::TransactionInput;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use anyhow::{anyhow, Result};
use raptor_chain::{NewHeadStream, NodeClient, ReconnectConfig};
use raptor_core::config::AppConfig;
use raptor_core::types::PendingTx;
use raptor_core::utils::{now_ms, parse_address, parse_u256_decimal};
use raptor_dex::abi::IUniswapV2Router02;
use raptor_dex::pool::load_pool;
use raptor_dex::{decode_swap_calldata, Classifier, PoolSnapshot, SwapCall};
use raptor_executor::bundle::{
    compute_tip, Bundle, BundleSubmitter, SubmitterSettings,
};
use raptor_executor::fees::{FeeOracle, FeeQuote, FeeSettings};
use raptor_executor::relay::RelayClient;
use raptor_executor::sender::TxSender;
use raptor_executor::signer::BundleSigner;
use raptor_executor::NonceAllocator;
use raptor_sim::profit::{
    arbitrage_gross_profit, constant_product_out, sandwich_gross_profit, BPS_DENOMINATOR,
};
use raptor_sim::{Opportunity, OpportunityKind, Recommendation, Simulator};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

const HEADS_CHANNEL_SIZE: usize = 128;
const PRUNE_INTERVAL_MS: u64 = 1_000;
const SUMMARY_TICK_MS: u64 = 5_000;
const TARGET_CAPACITY: usize = 10_000;
const TARGET_TTL_MS: u64 = 300_000;
const LEG_DEADLINE_SECS: u64 = 30;
const FRONT_LEG_SLIPPAGE_BPS: u64 = 100;

#[derive(Debug, Clone)]
struct Venue {
    name: String,
    router: Address,
    factory: Address,
}

/// Everything needed to go from a positive decision to a signed bundle.
struct ExecutionPlan {
    opportunity: Opportunity,
    legs: Vec<TransactionRequest>,
    quote: FeeQuote,
    gas_per_leg: u64,
}

/// Per-chain execution engine. Owns one instance of every component and
/// processes opportunities strictly one at a time, preserving the nonce
/// allocator's single-writer invariant.
pub struct Engine {
    cfg: AppConfig,
    chain: NodeClient,
    feed: MempoolFeed,
    simulator: Simulator,
    fee_oracle: FeeOracle,
    nonce: NonceAllocator,
    signer: BundleSigner,
    submitter: BundleSubmitter,
    targets: TargetStore,
    stats: EngineStats,
    metrics: Option<Arc<EngineMetrics>>,
    notifier: Option<TelegramNotifier>,
    venues: Vec<Venue>,
    wrapped_native: Address,
    attack_amount: U256,
    min_profit_threshold: U256,
    min_tip: U256,
    max_tip: U256,
    latest_head: Option<u64>,
}

impl Engine {
    pub async fn new(cfg: AppConfig) -> Result<Self> {
        cfg.validate()?;
        let chain = NodeClient::connect(&cfg.chain).await?;
        let signer = BundleSigner::from_env(&cfg.executor.signer_private_key_env)
            .map_err(|err| anyhow!("engine cannot start: {err}"))?;
        let relay = RelayClient::from_config(&cfg.relay, &cfg.executor.signer_private_key_env)
            .map_err(|err| anyhow!("engine cannot start: {err}"))?;

        let venues = cfg
            .dex
            .venues
            .iter()
            .map(|venue| {
                Ok(Venue {
                    name: venue.name.clone(),
                    router: parse_address(&venue.router)?,
                    factory: parse_address(&venue.factory)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if venues.is_empty() {
            return Err(anyhow!("engine cannot start: dex.venues is empty"));
        }
        let wrapped_native = parse_address(&cfg.dex.wrapped_native)?;

        let min_tip = parse_u256_decimal(&cfg.relay.min_tip_wei)?;
        let max_tip = parse_u256_decimal(&cfg.relay.max_tip_wei)?;
        if min_tip > max_tip {
            return Err(anyhow!(
                "engine cannot start: relay.min_tip_wei exceeds max_tip_wei"
            ));
        }

        let metrics = if cfg.observability.metrics_enabled {
            let metrics = Arc::new(EngineMetrics::new()?);
            spawn_metrics_server(&cfg.observability.metrics_bind, metrics.clone())?;
            Some(metrics)
        } else {
            None
        };

        let classifier = Arc::new(Classifier::new(
            venues.iter().map(|venue| (venue.router, venue.name.clone())),
        ));
        let feed = MempoolFeed::new(cfg.mempool.clone(), chain.clone(), classifier).with_metrics(
            metrics.as_ref().map(|m| m.pending.clone()),
            metrics.as_ref().map(|m| m.txpool.clone()),
        );

        let simulator = Simulator::new(chain.http.clone(), cfg.profit.sim_timeout_ms);
        let fee_oracle = FeeOracle::new(chain.http.clone(), FeeSettings::from_config(&cfg.fees)?);
        let nonce = NonceAllocator::new(
            chain.http.clone(),
            signer.address(),
            cfg.executor.nonce_lease_ms,
        );
        let sender = TxSender::new(chain.http.clone(), cfg.executor.send_timeout_ms);
        let submitter = BundleSubmitter::new(
            Arc::new(relay),
            Arc::new(sender),
            SubmitterSettings {
                simulate_before_send: cfg.relay.simulate_before_send,
                submission_timeout: Duration::from_millis(cfg.relay.submission_timeout_ms),
            },
        );

        let attack_amount = parse_u256_decimal(&cfg.profit.attack_amount_wei)?;
        let min_profit_threshold = parse_u256_decimal(&cfg.profit.min_profit_threshold_wei)?;
        let notifier = TelegramNotifier::from_env();

        Ok(Self {
            chain,
            feed,
            simulator,
            fee_oracle,
            nonce,
            signer,
            submitter,
            targets: TargetStore::new(TARGET_CAPACITY, TARGET_TTL_MS),
            stats: EngineStats::new(now_ms()),
            metrics,
            notifier,
            venues,
            wrapped_native,
            attack_amount,
            min_profit_threshold,
            min_tip,
            max_tip,
            latest_head: None,
            cfg,
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut events = self.feed.start().await?;
        let status = self.feed.status();
        info!(status = status.as_str(), "mempool feed status");
        if status == crate::feed::FeedStatus::Unavailable {
            warn!("no mempool visibility; engine stays up waiting for the condition to clear");
        }

        let reconnect = ReconnectConfig::new(
            self.cfg.mempool.ws_reconnect_base_ms,
            self.cfg.mempool.ws_reconnect_max_ms,
        );
        let mut heads_rx = NewHeadStream::new(
            self.chain.ws.clone(),
            HEADS_CHANNEL_SIZE,
            reconnect,
            self.metrics.as_ref().map(|m| m.heads.clone()),
        )
        .spawn()
        .await?;

        if let Err(err) = self.nonce.resync().await {
            warn!(?err, "nonce sync on startup failed");
        }

        let nonce_sync_enabled = self.cfg.executor.nonce_sync_interval_ms > 0;
        let mut nonce_sync = interval(Duration::from_millis(
            self.cfg.executor.nonce_sync_interval_ms.max(1),
        ));
        nonce_sync.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut prune_tick = interval(Duration::from_millis(PRUNE_INTERVAL_MS));
        prune_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary_tick = interval(Duration::from_millis(SUMMARY_TICK_MS));
        summary_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("engine running");
        loop {
            select! {
                Some(event) = events.recv() => {
                    // one opportunity at a time; awaiting here serializes
                    // the whole decide/submit cycle per chain
                    self.stats.totals.swaps_offered += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.swaps_total.inc();
                    }
                    if let Err(err) = self.handle_event(event).await {
                        warn!(?err, "opportunity cycle failed");
                    }
                }
                Some(head) = heads_rx.recv() => {
                    self.latest_head = Some(head);
                    debug!(block = head, "new head");
                }
                _ = nonce_sync.tick(), if nonce_sync_enabled => {
                    if let Err(err) = self.nonce.resync().await {
                        warn!(?err, "nonce resync failed");
                    }
                }
                _ = prune_tick.tick() => {
                    self.targets.prune(now_ms());
                }
                _ = summary_tick.tick() => {
                    self.stats.maybe_log(now_ms());
                }
            }
        }
    }

    async fn handle_event(&mut self, event: FeedEvent) -> Result<()> {
        let now = now_ms();
        let tx = event.tx;
        if !self.targets.track_seen(tx.hash, now) {
            return Ok(());
        }
        let Some(exchange) = event.classification.exchange.clone() else {
            self.targets
                .drop_terminal(tx.hash, "swap on unknown venue", now);
            return Ok(());
        };
        let Some(venue_idx) = self.venues.iter().position(|v| v.name == exchange) else {
            self.targets
                .drop_terminal(tx.hash, format!("no venue config for {exchange}"), now);
            return Ok(());
        };

        let swap = match decode_swap_calldata(&tx.input) {
            Ok(Some(swap)) => swap,
            Ok(None) => {
                self.targets
                    .drop_terminal(tx.hash, "swap selector without decodable arguments", now);
                return Ok(());
            }
            Err(err) => {
                self.targets
                    .drop_terminal(tx.hash, format!("calldata decode failed: {err}"), now);
                return Ok(());
            }
        };
        let (base_kind, victim_in) = match &swap {
            SwapCall::ExactIn { .. } => (
                OpportunityKind::Sandwich,
                swap.committed_amount_in(tx.value).unwrap_or(U256::ZERO),
            ),
            // exact-out victims only bound their input; the back-run leg
            // cannot be sized, so we only run ahead of them
            SwapCall::ExactOut { amount_in_max, .. } => (
                OpportunityKind::FrontRun,
                (*amount_in_max).unwrap_or(tx.value),
            ),
        };
        if victim_in.is_zero() {
            self.targets
                .drop_terminal(tx.hash, "victim commits no input", now);
            return Ok(());
        }
        let path = swap.path();
        if path.len() < 2 {
            self.targets.drop_terminal(tx.hash, "degenerate path", now);
            return Ok(());
        }
        let (token_in, token_out) = (path[0], path[1]);

        self.targets.set_state(tx.hash, TargetState::Simulating, now);
        let plan = self
            .evaluate(&tx, base_kind, venue_idx, token_in, token_out, victim_in)
            .await;
        self.stats.totals.opportunities_priced += 1;
        if let Some(metrics) = &self.metrics {
            metrics
                .opportunities_total
                .with_label_values(&[plan.opportunity.recommendation.as_str()])
                .inc();
        }

        match plan.opportunity.recommendation {
            Recommendation::Abort => {
                self.stats.totals.aborted += 1;
                let reason = plan
                    .opportunity
                    .reason
                    .clone()
                    .unwrap_or_else(|| "abort".to_string());
                debug!(target = %tx.hash, %reason, "opportunity aborted");
                self.targets.drop_transient(tx.hash, reason, now_ms());
                Ok(())
            }
            Recommendation::Adjust => {
                self.stats.totals.adjusted += 1;
                if self.cfg.profit.adjust_requote {
                    self.requote_and_maybe_execute(tx, plan).await
                } else {
                    self.targets
                        .drop_transient(tx.hash, "thin margin", now_ms());
                    Ok(())
                }
            }
            Recommendation::Execute => self.execute(&tx, plan).await,
        }
    }

    /// Prices the opportunity: reserves, gross capture, a candidate/target
    /// simulation pair, and the fee-adjusted recommendation. Every failure
    /// mode lands as an aborted plan, never an `Err`.
    async fn evaluate(
        &mut self,
        tx: &PendingTx,
        base_kind: OpportunityKind,
        venue_idx: usize,
        token_in: Address,
        token_out: Address,
        victim_in: U256,
    ) -> ExecutionPlan {
        let fee_bps = self.cfg.dex.swap_fee_bps;
        let quote = self.fee_oracle.quote(false).await;

        let pool = match self.read_pool(venue_idx, token_in, token_out).await {
            Ok(Some(pool)) => pool,
            Ok(None) => {
                return self.aborted_plan(tx, base_kind, quote, "pool missing or empty");
            }
            Err(reason) => {
                return self.aborted_plan(tx, base_kind, quote, reason);
            }
        };

        let same_venue_gross =
            sandwich_gross_profit(self.attack_amount, victim_in, pool.reserve_in, pool.reserve_out, fee_bps);

        // cross-venue spread on the same hop, best effort: a failed read
        // on a secondary venue only forfeits the comparison
        let mut best_arb: Option<(usize, bool, U256, PoolSnapshot)> = None;
        for other_idx in 0..self.venues.len() {
            if other_idx == venue_idx {
                continue;
            }
            let Ok(Some(other)) = self.read_pool(other_idx, token_in, token_out).await else {
                continue;
            };
            let (gross, buy_on_target_venue) =
                cross_venue_gross(self.attack_amount, &pool, &other, fee_bps);
            if gross > best_arb.map(|(_, _, g, _)| g).unwrap_or(U256::ZERO) {
                best_arb = Some((other_idx, buy_on_target_venue, gross, other));
            }
        }

        let (kind, gross, legs) = match best_arb {
            Some((other_idx, buy_on_target_venue, arb_gross, other_pool))
                if arb_gross > same_venue_gross =>
            {
                let (buy_idx, sell_idx, buy_pool) = if buy_on_target_venue {
                    (venue_idx, other_idx, pool)
                } else {
                    (other_idx, venue_idx, other_pool)
                };
                let bridged = constant_product_out(
                    self.attack_amount,
                    buy_pool.reserve_in,
                    buy_pool.reserve_out,
                    fee_bps,
                );
                let legs = vec![
                    self.build_exact_in_leg(
                        self.venues[buy_idx].router,
                        token_in,
                        token_out,
                        self.attack_amount,
                        discounted(bridged),
                    ),
                    self.build_exact_in_leg(
                        self.venues[sell_idx].router,
                        token_out,
                        token_in,
                        bridged,
                        self.attack_amount,
                    ),
                ];
                (OpportunityKind::Arbitrage, arb_gross, legs)
            }
            _ => {
                let front_out = constant_product_out(
                    self.attack_amount,
                    pool.reserve_in,
                    pool.reserve_out,
                    fee_bps,
                );
                let router = self.venues[venue_idx].router;
                let front = self.build_exact_in_leg(
                    router,
                    token_in,
                    token_out,
                    self.attack_amount,
                    discounted(front_out),
                );
                let legs = match base_kind {
                    OpportunityKind::Sandwich => vec![
                        front,
                        self.build_exact_in_leg(
                            router,
                            token_out,
                            token_in,
                            front_out,
                            self.attack_amount,
                        ),
                    ],
                    _ => vec![front],
                };
                (base_kind, same_venue_gross, legs)
            }
        };

        if gross.is_zero() {
            return self.aborted_plan(tx, kind, quote, "no gross capture at current reserves");
        }

        let pair = self
            .simulator
            .simulate_pair(&legs[0], &replay_request(tx))
            .await;
        if let Some(reason) = pair.failure_reason() {
            return self.aborted_plan(tx, kind, quote, reason);
        }
        let gas_per_leg = pair.candidate.gas_used;
        let gas_total = gas_per_leg.saturating_mul(legs.len() as u64);

        // front-running is a fee auction; arbitrage only needs inclusion
        let effective_quote = match kind {
            OpportunityKind::Arbitrage => quote,
            _ => self.fee_oracle.boosted(&quote),
        };
        let opportunity = Opportunity::priced(
            tx.hash,
            kind,
            gross,
            gas_total,
            effective_quote.primary_rate(),
            self.min_profit_threshold,
        );
        ExecutionPlan {
            opportunity,
            legs,
            quote: effective_quote,
            gas_per_leg,
        }
    }

    /// Adjust path: one forced re-quote with the boosted schedule, then
    /// execute or walk away. Never loops.
    async fn requote_and_maybe_execute(
        &mut self,
        tx: Arc<PendingTx>,
        plan: ExecutionPlan,
    ) -> Result<()> {
        let fresh = self.fee_oracle.quote(true).await;
        let boosted = self.fee_oracle.boosted(&fresh);
        let gas_total = plan.gas_per_leg.saturating_mul(plan.legs.len() as u64);
        let opportunity = Opportunity::priced(
            tx.hash,
            plan.opportunity.kind,
            plan.opportunity.gross_profit,
            gas_total,
            boosted.primary_rate(),
            self.min_profit_threshold,
        );
        if opportunity.recommendation == Recommendation::Execute {
            self.execute(
                &tx,
                ExecutionPlan {
                    opportunity,
                    quote: boosted,
                    ..plan
                },
            )
            .await
        } else {
            self.targets
                .drop_transient(tx.hash, "thin margin after requote", now_ms());
            Ok(())
        }
    }

    async fn execute(&mut self, tx: &PendingTx, plan: ExecutionPlan) -> Result<()> {
        let now = now_ms();
        self.targets.set_state(tx.hash, TargetState::Submitting, now);

        let target_block = match self.latest_head {
            Some(head) => head + 1,
            None => match self.chain.http.get_block_number().await {
                Ok(number) => number + 1,
                Err(err) => {
                    warn!(?err, "head unknown; deferring target");
                    self.targets.drop_transient(tx.hash, "head unknown", now);
                    return Ok(());
                }
            },
        };
        let tip = compute_tip(
            plan.opportunity.net_profit,
            self.cfg.relay.tip_fraction_bps,
            self.min_tip,
            self.max_tip,
        );
        let gas_limit = plan.gas_per_leg
            + plan.gas_per_leg * self.cfg.profit.gas_limit_buffer_bps as u64
                / BPS_DENOMINATOR;

        info!(
            target = %tx.hash,
            kind = plan.opportunity.kind.as_str(),
            net = %plan.opportunity.net_profit,
            target_block,
            legs = plan.legs.len(),
            "executing opportunity"
        );

        let bundle = match self
            .build_bundle(&plan, gas_limit, tip, target_block, false)
            .await
        {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!(?err, "bundle build failed");
                self.targets
                    .drop_transient(tx.hash, format!("build failed: {err}"), now_ms());
                return Ok(());
            }
        };
        let mut result = self.submitter.submit(bundle).await;

        // stale-state recovery: one forced nonce refresh, one retry
        if !result.success && is_stale_nonce_error(result.error.as_deref()) {
            info!("stale nonce suspected; forcing refresh and retrying once");
            match self
                .build_bundle(&plan, gas_limit, tip, target_block, true)
                .await
            {
                Ok(bundle) => result = self.submitter.submit(bundle).await,
                Err(err) => warn!(?err, "rebuild after nonce refresh failed"),
            }
        }

        self.stats.record_submission(
            &result,
            plan.opportunity.gas_cost,
            result.success.then_some(tip),
        );
        if let Some(metrics) = &self.metrics {
            let outcome = if result.success {
                result.relay_used
            } else {
                "failed"
            };
            metrics.bundles_total.with_label_values(&[outcome]).inc();
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify_submission(&plan.opportunity, &result);
        }

        if result.success {
            info!(
                relay = result.relay_used,
                id = result.id.as_deref().unwrap_or("<none>"),
                elapsed_ms = result.elapsed_ms,
                "bundle submitted"
            );
            self.targets.mark_done(tx.hash, result.id.clone(), now_ms());
        } else {
            warn!(
                relay = result.relay_used,
                error = result.error.as_deref().unwrap_or("unknown"),
                failed_leg = ?result.failed_tx_index,
                "bundle failed"
            );
            self.targets.drop_terminal(
                tx.hash,
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "submission failed".to_string()),
                now_ms(),
            );
        }
        Ok(())
    }

    async fn build_bundle(
        &mut self,
        plan: &ExecutionPlan,
        gas_limit: u64,
        tip: U256,
        target_block: u64,
        force_nonce_refresh: bool,
    ) -> Result<Bundle> {
        let mut raws = Vec::with_capacity(plan.legs.len());
        let mut force = force_nonce_refresh;
        for leg in &plan.legs {
            let nonce = self.nonce.next(force).await?;
            force = false;
            let mut tx = leg.clone();
            tx.nonce = Some(nonce);
            tx.gas = Some(gas_limit);
            tx.chain_id = Some(self.cfg.chain.chain_id);
            plan.quote.apply(&mut tx);
            raws.push(self.signer.sign(tx).await?);
        }
        Ok(Bundle::new(raws, target_block).with_tip(tip))
    }

    async fn read_pool(
        &self,
        venue_idx: usize,
        token_in: Address,
        token_out: Address,
    ) -> Result<Option<PoolSnapshot>, String> {
        let venue = &self.venues[venue_idx];
        match timeout(
            Duration::from_millis(self.cfg.dex.reserve_read_timeout_ms),
            load_pool(&self.chain.http, venue.factory, token_in, token_out),
        )
        .await
        {
            Ok(Ok(pool)) => Ok(pool),
            Ok(Err(err)) => Err(format!("reserve read failed on {}: {err}", venue.name)),
            Err(_) => Err(format!("reserve read timed out on {}", venue.name)),
        }
    }

    fn aborted_plan(
        &self,
        tx: &PendingTx,
        kind: OpportunityKind,
        quote: FeeQuote,
        reason: impl Into<String>,
    ) -> ExecutionPlan {
        ExecutionPlan {
            opportunity: Opportunity::aborted(tx.hash, kind, reason),
            legs: Vec::new(),
            quote,
            gas_per_leg: 0,
        }
    }

    fn build_exact_in_leg(
        &self,
        router: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        min_out: U256,
    ) -> TransactionRequest {
        build_exact_in_leg(
            self.signer.address(),
            self.wrapped_native,
            router,
            token_in,
            token_out,
            amount_in,
            min_out,
        )
    }
}

fn discounted(amount: U256) -> U256 {
    amount * U256::from(BPS_DENOMINATOR - FRONT_LEG_SLIPPAGE_BPS) / U256::from(BPS_DENOMINATOR)
}

/// Best gross of the two arbitrage directions between the target venue's
/// pool and another venue's pool, both read in the victim's orientation.
/// The flag is true when the buy leg belongs on the target venue.
fn cross_venue_gross(
    attack: U256,
    target_pool: &PoolSnapshot,
    other_pool: &PoolSnapshot,
    fee_bps: u32,
) -> (U256, bool) {
    let buy_here = arbitrage_gross_profit(
        attack,
        (target_pool.reserve_in, target_pool.reserve_out),
        (other_pool.reserve_out, other_pool.reserve_in),
        fee_bps,
    );
    let buy_there = arbitrage_gross_profit(
        attack,
        (other_pool.reserve_in, other_pool.reserve_out),
        (target_pool.reserve_out, target_pool.reserve_in),
        fee_bps,
    );
    if buy_here >= buy_there {
        (buy_here, true)
    } else {
        (buy_there, false)
    }
}

/// Re-expresses an observed pending transaction as a dry-run request from
/// its original sender. Fee and nonce fields are left unset so the dry
/// run checks execution, not account bookkeeping.
fn replay_request(tx: &PendingTx) -> TransactionRequest {
    TransactionRequest {
        from: Some(tx.from),
        to: tx.to.map(TxKind::Call),
        value: Some(tx.value),
        input: TransactionInput::new(tx.input.clone()),
        ..Default::default()
    }
}

fn build_exact_in_leg(
    sender: Address,
    wrapped_native: Address,
    router: Address,
    token_in: Address,
    token_out: Address,
    amount_in: U256,
    min_out: U256,
) -> TransactionRequest {
    let deadline = U256::from(now_ms() / 1_000 + LEG_DEADLINE_SECS);
    let path = vec![token_in, token_out];
    let to = sender;
    let (input, value) = if token_in == wrapped_native {
        let call = IUniswapV2Router02::swapExactETHForTokensCall {
            amountOutMin: min_out,
            path,
            to,
            deadline,
        };
        (call.abi_encode(), Some(amount_in))
    } else if token_out == wrapped_native {
        let call = IUniswapV2Router02::swapExactTokensForETHCall {
            amountIn: amount_in,
            amountOutMin: min_out,
            path,
            to,
            deadline,
        };
        (call.abi_encode(), None)
    } else {
        let call = IUniswapV2Router02::swapExactTokensForTokensCall {
            amountIn: amount_in,
            amountOutMin: min_out,
            path,
            to,
            deadline,
        };
        (call.abi_encode(), None)
    };
    TransactionRequest {
        from: Some(sender),
        to: Some(TxKind::Call(router)),
        input: TransactionInput::new(input.into()),
        value,
        ..Default::default()
    }
}

fn is_stale_nonce_error(error: Option<&str>) -> bool {
    let Some(error) = error else {
        return false;
    };
    let error = error.to_ascii_lowercase();
    error.contains("nonce too low")
        || error.contains("invalid nonce")
        || error.contains("replacement transaction underpriced")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes};

    fn pool(reserve_in: u64, reserve_out: u64) -> PoolSnapshot {
        PoolSnapshot {
            pair: address!("0x5555555555555555555555555555555555555555"),
            reserve_in: U256::from(reserve_in),
            reserve_out: U256::from(reserve_out),
        }
    }

    #[test]
    fn stale_nonce_detection_matches_node_phrasing() {
        assert!(is_stale_nonce_error(Some("leg 0 broadcast failed: nonce too low")));
        assert!(is_stale_nonce_error(Some("Invalid nonce for sender")));
        assert!(is_stale_nonce_error(Some(
            "replacement transaction underpriced"
        )));
        assert!(!is_stale_nonce_error(Some("execution reverted")));
        assert!(!is_stale_nonce_error(None));
    }

    #[test]
    fn cross_venue_gross_picks_the_profitable_direction() {
        // target venue prices token_out twice as high as the other venue:
        // buying there and selling here wins
        let target = pool(1_000_000, 1_000_000);
        let other = pool(1_000_000, 2_000_000);
        let (gross, buy_on_target) = cross_venue_gross(U256::from(10_000u64), &target, &other, 30);
        assert!(gross > U256::ZERO);
        assert!(!buy_on_target);

        let (gross_rev, buy_on_target_rev) =
            cross_venue_gross(U256::from(10_000u64), &other, &target, 30);
        assert!(gross_rev > U256::ZERO);
        assert!(buy_on_target_rev);
    }

    #[test]
    fn aligned_venues_offer_no_arbitrage() {
        let target = pool(1_000_000, 1_000_000);
        let other = pool(1_000_000, 1_000_000);
        let (gross, _) = cross_venue_gross(U256::from(10_000u64), &target, &other, 30);
        assert_eq!(gross, U256::ZERO);
    }

    #[test]
    fn native_in_leg_carries_value() {
        let weth = address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let token = address!("0x1000000000000000000000000000000000000001");
        let leg = build_exact_in_leg(
            address!("0x9000000000000000000000000000000000000009"),
            weth,
            address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d"),
            weth,
            token,
            U256::from(1_000u64),
            U256::from(900u64),
        );
        assert_eq!(leg.value, Some(U256::from(1_000u64)));
        let input = leg.input.input().unwrap();
        assert_eq!(
            &input[..4],
            &IUniswapV2Router02::swapExactETHForTokensCall::SELECTOR
        );
    }

    #[test]
    fn token_to_native_leg_uses_eth_exit() {
        let weth = address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
        let token = address!("0x1000000000000000000000000000000000000001");
        let leg = build_exact_in_leg(
            address!("0x9000000000000000000000000000000000000009"),
            weth,
            address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d"),
            token,
            weth,
            U256::from(1_000u64),
            U256::from(900u64),
        );
        assert_eq!(leg.value, None);
        let input = leg.input.input().unwrap();
        assert_eq!(
            &input[..4],
            &IUniswapV2Router02::swapExactTokensForETHCall::SELECTOR
        );
    }

    #[test]
    fn replay_request_preserves_sender_and_payload() {
        let victim = PendingTx {
            hash: alloy::primitives::B256::with_last_byte(1),
            from: address!("0x9000000000000000000000000000000000000009"),
            to: Some(address!("0x7a250d5630b4cf539739df2c5dacb4c659f2488d")),
            value: U256::from(5u64),
            input: Bytes::from(vec![0x38, 0xed, 0x17, 0x39]),
            nonce: 7,
            gas_limit: 100_000,
            gas_price: None,
            max_fee_per_gas: Some(1),
            max_priority_fee_per_gas: Some(1),
            first_seen_ms: 0,
        };
        let request = replay_request(&victim);
        assert_eq!(request.from, Some(victim.from));
        assert_eq!(request.value, Some(victim.value));
        assert!(request.nonce.is_none());
        assert!(request.max_fee_per_gas.is_none());
    }

    #[test]
    fn discount_shaves_slippage_allowance() {
        assert_eq!(discounted(U256::from(10_000u64)), U256::from(9_900u64));
    }
}
