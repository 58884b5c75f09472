//! Arbitrage Worker
//! Mission: Own one leg cycle: wake on every price change, evaluate, and
//! when the spread is positive walk the cycle leg by leg
//! Philosophy: Every lifecycle move is a compare-and-swap; a transition that
//! finds the wrong source state is a no-op, not an error

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use rust_decimal::Decimal;

use crate::config::WorkerConfig;
use crate::engine::{ArbitrageEngine, LegCycle, CYCLE_LEN};
use crate::exchange::{BookTicker, ExchangeClient, OrderStatus, Symbol};
use crate::market::PriceCache;
use crate::orders::OrderTracker;

// ============================================================================
// Worker state machine
// ============================================================================

/// Lifecycle state of one worker. Exactly one live value per worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Stopped = 0,
    Initializing = 1,
    Running = 2,
    EvaluatingArbitrage = 3,
    ArbitrageStarted = 4,
    Failed = 5,
}

impl WorkerState {
    fn from_u8(v: u8) -> WorkerState {
        match v {
            0 => WorkerState::Stopped,
            1 => WorkerState::Initializing,
            2 => WorkerState::Running,
            3 => WorkerState::EvaluatingArbitrage,
            4 => WorkerState::ArbitrageStarted,
            _ => WorkerState::Failed,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Initializing => write!(f, "INITIALIZING"),
            Self::Running => write!(f, "RUNNING"),
            Self::EvaluatingArbitrage => write!(f, "EVALUATING_ARBITRAGE"),
            Self::ArbitrageStarted => write!(f, "ARBITRAGE_STARTED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Lock-free state cell with compare-and-swap transitions.
pub struct WorkerStateCell(AtomicU8);

impl WorkerStateCell {
    pub fn new(initial: WorkerState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Transition succeeds iff the state equals `expected` at the instant of
    /// the call. Under N racing callers exactly one wins.
    pub fn try_transition(&self, expected: WorkerState, next: WorkerState) -> bool {
        self.0
            .compare_exchange(
                expected as u8,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

impl Default for WorkerStateCell {
    fn default() -> Self {
        Self::new(WorkerState::Stopped)
    }
}

/// Shared view of a running worker, kept by the strategy for status reports.
#[derive(Clone)]
pub struct WorkerHandle {
    name: String,
    state: Arc<WorkerStateCell>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        self.state.load()
    }

    /// Human-readable "{name} {STATE}" line for the control surface.
    pub fn state_line(&self) -> String {
        format!("{} {}", self.name, self.state.load())
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Drives one triangular cycle against one exchange client.
///
/// Owns a private [`PriceCache`] (so the auto-reset change signal has exactly
/// one consumer) and a private [`OrderTracker`].
pub struct ArbitrageWorker {
    config: WorkerConfig,
    client: Arc<dyn ExchangeClient>,
    state: Arc<WorkerStateCell>,
    prices: Arc<PriceCache>,
    tracker: Arc<OrderTracker>,
    engine: Option<ArbitrageEngine>,
}

impl ArbitrageWorker {
    pub fn new(config: WorkerConfig, client: Arc<dyn ExchangeClient>) -> Self {
        let tracker = Arc::new(OrderTracker::new(Arc::clone(&client)));
        Self {
            config,
            client,
            state: Arc::new(WorkerStateCell::default()),
            prices: Arc::new(PriceCache::new()),
            tracker,
            engine: None,
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            name: self.config.name.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Main loop: initialize, then wait-evaluate until cancelled.
    ///
    /// Initialization failure parks the worker in `Failed` until the run is
    /// cancelled (external restart builds a fresh worker); the terminate path
    /// then moves it to `Stopped`.
    pub async fn execute(mut self, ct: CancellationToken) {
        info!(worker = %self.config.name, "worker_starting");

        if !self.initialize().await {
            self.state
                .try_transition(WorkerState::Initializing, WorkerState::Failed);
            error!(worker = %self.config.name, "worker_initialization_failed");
            ct.cancelled().await;
            self.terminate().await;
            return;
        }

        self.state
            .try_transition(WorkerState::Initializing, WorkerState::Running);
        info!(worker = %self.config.name, pairs = ?self.config.pairs, "worker_running");

        loop {
            select! {
                _ = ct.cancelled() => break,
                _ = self.prices.wait_for_change() => {
                    self.evaluate_arbitrage(&ct).await;
                }
            }
        }

        self.terminate().await;
    }

    /// Resolve symbols, seed and subscribe the price cache, wire the order
    /// feed, fetch precisions, and build the engine.
    ///
    /// Any failure is final for this run: no partial cycles, no retries.
    async fn initialize(&mut self) -> bool {
        if !self
            .state
            .try_transition(WorkerState::Stopped, WorkerState::Initializing)
        {
            return false;
        }

        if self.config.pairs.len() != CYCLE_LEN {
            error!(
                worker = %self.config.name,
                got = self.config.pairs.len(),
                expected = CYCLE_LEN,
                "cycle_arity_mismatch"
            );
            return false;
        }

        let mut symbols = Vec::with_capacity(CYCLE_LEN);
        for pair in &self.config.pairs {
            match Symbol::parse(pair) {
                Ok(s) => symbols.push(s),
                Err(e) => {
                    error!(worker = %self.config.name, error = %e, "bad_pair");
                    return false;
                }
            }
        }

        if !self.prices.register_symbols(&symbols) {
            error!(worker = %self.config.name, "duplicate_symbol_in_cycle");
            return false;
        }

        let initial = match self.client.fetch_prices(&symbols).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(worker = %self.config.name, error = %e, "initial_price_fetch_failed");
                return false;
            }
        };
        if !self.prices.set_initial_prices(initial, symbols.len()) {
            warn!(worker = %self.config.name, "initial_price_fetch_short");
            return false;
        }

        let cache = Arc::clone(&self.prices);
        let on_tick = Arc::new(move |name: &str, ticker: BookTicker| {
            cache.on_price_update(name, ticker);
        });
        if !self
            .client
            .subscribe_price_changes(&symbols, on_tick)
            .await
        {
            warn!(worker = %self.config.name, "price_subscription_failed");
            return false;
        }

        let tracker = Arc::clone(&self.tracker);
        let on_order = Arc::new(move |update: crate::exchange::OrderUpdate| {
            tracker.on_order_update(update)
        });
        if !self.client.subscribe_order_updates(on_order).await {
            warn!(worker = %self.config.name, "order_subscription_failed");
            return false;
        }

        let precisions = match self.client.fetch_precisions(&symbols).await {
            Ok(p) => p,
            Err(e) => {
                warn!(worker = %self.config.name, error = %e, "precision_fetch_failed");
                return false;
            }
        };

        let cycle = LegCycle {
            symbols: match <[Symbol; CYCLE_LEN]>::try_from(symbols) {
                Ok(arr) => arr,
                Err(_) => return false,
            },
            holding_asset: self.config.holding_asset.clone(),
            order_amount: self.config.order_amount,
            fee: self.config.fee,
        };
        match ArbitrageEngine::new(cycle, precisions) {
            Ok(engine) => {
                info!(
                    worker = %self.config.name,
                    sides = ?engine.sides(),
                    "worker_initialized"
                );
                self.engine = Some(engine);
                true
            }
            Err(e) => {
                error!(worker = %self.config.name, error = %e, "engine_build_failed");
                false
            }
        }
    }

    /// One evaluation pass: snapshot, recompute, and on a positive spread
    /// walk the whole cycle before going back to `Running`.
    async fn evaluate_arbitrage(&mut self, ct: &CancellationToken) {
        if !self
            .state
            .try_transition(WorkerState::Running, WorkerState::EvaluatingArbitrage)
        {
            return;
        }

        let snapshot = self.prices.snapshot();
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let result = engine.evaluate(&snapshot).clone();

        if result.spread > Decimal::ZERO {
            info!(
                worker = %self.config.name,
                ratio = %result.ratio,
                spread = %result.spread,
                quantities = ?result.quantities,
                "arbitrage_opportunity"
            );
            self.start_arbitrage(ct).await;
        } else {
            if result.ratio >= Decimal::ONE + self.config.min_profitability {
                warn!(
                    worker = %self.config.name,
                    ratio = %result.ratio,
                    spread = %result.spread,
                    "ratio_clears_threshold_but_rounding_ate_the_spread"
                );
            }
            self.state
                .try_transition(WorkerState::EvaluatingArbitrage, WorkerState::Running);
        }
    }

    /// Place the three legs sequentially; leg i+1 is placed only after leg
    /// i's status stream fully drained to a terminal status.
    async fn start_arbitrage(&mut self, ct: &CancellationToken) {
        if !self.state.try_transition(
            WorkerState::EvaluatingArbitrage,
            WorkerState::ArbitrageStarted,
        ) {
            return;
        }

        for leg in 0..CYCLE_LEN {
            if !self.place_leg(leg, ct).await {
                error!(worker = %self.config.name, leg, "cycle_aborted");
                // Cancel anything still open from earlier legs; no reversal
                // trades are attempted.
                self.tracker.cancel_all().await;
                break;
            }
        }

        self.state
            .try_transition(WorkerState::ArbitrageStarted, WorkerState::Running);
    }

    /// Place one leg and drain its status stream.
    ///
    /// Returns true only if the leg filled. A submission failure, a canceled
    /// order, or run cancellation all abort the cycle.
    async fn place_leg(&mut self, leg: usize, ct: &CancellationToken) -> bool {
        let Some(engine) = self.engine.as_ref() else {
            return false;
        };
        let trade = match engine.trade_at(leg) {
            Ok(trade) => trade,
            Err(e) => {
                error!(worker = %self.config.name, leg, error = %e, "leg_trade_rejected");
                return false;
            }
        };

        info!(
            worker = %self.config.name,
            leg,
            symbol = %trade.symbol(),
            side = %trade.side(),
            quantity = %trade.quantity(),
            price = ?trade.price(),
            "placing_leg"
        );

        let Some(mut updates) = self.tracker.place_and_track(&trade).await else {
            // Empty stream == submission failure, never "no status yet".
            return false;
        };

        let mut filled = false;
        loop {
            select! {
                _ = ct.cancelled() => {
                    // Stop waiting locally and ask the venue to cancel.
                    self.tracker.cancel(trade.client_order_id()).await;
                    return false;
                }
                update = updates.next() => match update {
                    Some(update) => {
                        debug!(
                            worker = %self.config.name,
                            leg,
                            client_order_id = %update.client_order_id,
                            status = %update.status,
                            filled_quantity = %update.filled_quantity,
                            "leg_order_update"
                        );
                        if update.status == OrderStatus::Filled {
                            filled = true;
                        }
                    }
                    None => break,
                }
            }
        }
        filled
    }

    /// Final bookkeeping on the way out: cancel tracked orders, then move
    /// whatever state we are in to `Stopped`.
    async fn terminate(&self) {
        self.tracker.cancel_all().await;
        self.stop_worker();
        info!(worker = %self.config.name, "worker_stopped");
    }

    fn stop_worker(&self) {
        for from in [
            WorkerState::Initializing,
            WorkerState::Failed,
            WorkerState::Running,
            WorkerState::EvaluatingArbitrage,
            WorkerState::ArbitrageStarted,
        ] {
            if self.state.try_transition(from, WorkerState::Stopped) {
                return;
            }
        }
    }
}
