//! Paper Exchange Client
//! Mission: Let the engine run end to end with no venue attached
//! Philosophy: Log every call, fill every order instantly, never touch a
//! socket

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    BookTicker, ExchangeClient, OrderCallback, OrderStatus, OrderUpdate, Precision,
    PriceCallback, Symbol,
};
use crate::error::EngineError;
use crate::orders::Trade;
use async_trait::async_trait;
use chrono::Utc;

/// In-process stand-in for the connectivity layer.
///
/// Serves seeded tickers and precisions, accepts every subscription, and
/// acknowledges submitted orders with an immediate `Open` → `Filled`
/// sequence pushed through the registered order callbacks. Used by the
/// binary and by tests; scripted failure modes are toggled at construction.
pub struct PaperExchange {
    tickers: RwLock<HashMap<String, BookTicker>>,
    precisions: RwLock<HashMap<String, Precision>>,
    price_subs: Mutex<Vec<PriceCallback>>,
    order_subs: Arc<Mutex<Vec<OrderCallback>>>,
    submissions: Mutex<Vec<Trade>>,
    canceled: Mutex<Vec<String>>,
    reject_submissions: AtomicBool,
    auto_fill: AtomicBool,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self {
            tickers: RwLock::new(HashMap::new()),
            precisions: RwLock::new(HashMap::new()),
            price_subs: Mutex::new(Vec::new()),
            order_subs: Arc::new(Mutex::new(Vec::new())),
            submissions: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
            reject_submissions: AtomicBool::new(false),
            auto_fill: AtomicBool::new(true),
        }
    }

    /// Every `submit_order` call returns `None`.
    pub fn reject_submissions(self) -> Self {
        self.reject_submissions.store(true, Ordering::SeqCst);
        self
    }

    /// Acknowledge submissions but push no fills (orders stay open).
    pub fn without_auto_fill(self) -> Self {
        self.auto_fill.store(false, Ordering::SeqCst);
        self
    }

    pub fn seed_ticker(&self, name: &str, ticker: BookTicker) {
        self.tickers.write().insert(name.to_string(), ticker);
    }

    pub fn seed_precision(&self, name: &str, precision: Precision) {
        self.precisions.write().insert(name.to_string(), precision);
    }

    /// Push a tick through every price subscription (the test/demo feed).
    pub fn push_tick(&self, name: &str, ticker: BookTicker) {
        self.tickers.write().insert(name.to_string(), ticker);
        for cb in self.price_subs.lock().iter() {
            cb(name, ticker);
        }
    }

    /// Push an order update through every order subscription.
    pub fn push_order_update(&self, update: OrderUpdate) {
        for cb in self.order_subs.lock().iter() {
            cb(update.clone());
        }
    }

    /// Every trade accepted so far, in submission order.
    pub fn submissions(&self) -> Vec<Trade> {
        self.submissions.lock().clone()
    }

    /// Client order ids cancellation was requested for.
    pub fn canceled_ids(&self) -> Vec<String> {
        self.canceled.lock().clone()
    }

    fn broadcast_later(&self, updates: Vec<OrderUpdate>) {
        let subs = Arc::clone(&self.order_subs);
        tokio::spawn(async move {
            for update in updates {
                for cb in subs.lock().iter() {
                    cb(update.clone());
                }
            }
        });
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn fetch_prices(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<String, BookTicker>, EngineError> {
        let tickers = self.tickers.read();
        Ok(symbols
            .iter()
            .filter_map(|s| tickers.get(&s.name).map(|t| (s.name.clone(), *t)))
            .collect())
    }

    async fn fetch_precisions(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<String, Precision>, EngineError> {
        let precisions = self.precisions.read();
        Ok(symbols
            .iter()
            .filter_map(|s| precisions.get(&s.name).map(|p| (s.name.clone(), *p)))
            .collect())
    }

    async fn subscribe_price_changes(&self, symbols: &[Symbol], on_tick: PriceCallback) -> bool {
        info!(symbols = ?symbols.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
              "paper_price_subscription");
        self.price_subs.lock().push(on_tick);
        true
    }

    async fn subscribe_order_updates(&self, on_update: OrderCallback) -> bool {
        self.order_subs.lock().push(on_update);
        true
    }

    async fn submit_order(&self, trade: &Trade) -> Option<OrderUpdate> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            warn!(symbol = %trade.symbol(), kind = trade.kind(), "paper_order_rejected");
            return None;
        }

        info!(
            symbol = %trade.symbol(),
            side = %trade.side(),
            kind = trade.kind(),
            quantity = %trade.quantity(),
            price = ?trade.price(),
            "paper_order_accepted"
        );
        self.submissions.lock().push(trade.clone());

        let open = OrderUpdate {
            client_order_id: trade.client_order_id().to_string(),
            symbol: trade.symbol().to_string(),
            status: OrderStatus::Open,
            filled_quantity: Decimal::ZERO,
            timestamp: Utc::now(),
        };

        if self.auto_fill.load(Ordering::SeqCst) {
            let filled = OrderUpdate {
                status: OrderStatus::Filled,
                filled_quantity: trade.quantity(),
                timestamp: Utc::now(),
                ..open.clone()
            };
            self.broadcast_later(vec![open.clone(), filled]);
        }

        Some(open)
    }

    async fn cancel_order(&self, client_order_id: &str) -> Result<(), EngineError> {
        info!(client_order_id, "paper_order_cancel");
        self.canceled.lock().push(client_order_id.to_string());
        self.broadcast_later(vec![OrderUpdate {
            client_order_id: client_order_id.to_string(),
            symbol: String::new(),
            status: OrderStatus::Canceled,
            filled_quantity: Decimal::ZERO,
            timestamp: Utc::now(),
        }]);
        Ok(())
    }
}
