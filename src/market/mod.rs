//! Price Cache
//! Mission: Last-value best bid/ask per symbol, with a wake-up on every
//! accepted tick
//! Philosophy: The feed writes, one worker reads; snapshots are cheap and
//! approximately simultaneous

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::Notify;
use tracing::trace;

use crate::exchange::{BookTicker, Symbol};

/// Concurrent best bid/ask store for one worker's symbol set.
///
/// The change notification is a single-slot auto-reset signal
/// (`tokio::sync::Notify` with `notify_one`): one pending wake-up at most,
/// consumed by the next waiter. Each worker owns its own cache, so the
/// one-consumer requirement of that primitive holds by construction.
///
/// Snapshots are shallow copies and are not synchronized across symbols: a
/// snapshot taken while another symbol updates may mix tickers from slightly
/// different instants. Accepted approximation for top-of-book cross-rate
/// evaluation.
pub struct PriceCache {
    tickers: RwLock<HashMap<String, BookTicker>>,
    changed: Notify,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            tickers: RwLock::new(HashMap::new()),
            changed: Notify::new(),
        }
    }

    /// Seed each symbol with a zero ticker.
    ///
    /// Returns false if the input contains a duplicate (or a symbol that was
    /// already registered); the cycle is misconfigured and the worker must
    /// not proceed.
    pub fn register_symbols(&self, symbols: &[Symbol]) -> bool {
        let mut tickers = self.tickers.write();
        for symbol in symbols {
            if tickers
                .insert(symbol.name.clone(), BookTicker::default())
                .is_some()
            {
                return false;
            }
        }
        true
    }

    /// Bulk-load tickers from a one-shot fetch.
    ///
    /// Returns false if fewer tickers were supplied than `expected` symbols;
    /// the fetch came back short and initialization must fail.
    pub fn set_initial_prices(&self, prices: HashMap<String, BookTicker>, expected: usize) -> bool {
        if prices.len() < expected {
            return false;
        }
        let mut tickers = self.tickers.write();
        for (name, ticker) in prices {
            tickers.insert(name, ticker);
        }
        true
    }

    /// Feed entry point: validate, overwrite, signal.
    ///
    /// Invalid tickers (any field not strictly positive) are dropped without
    /// touching the cache or the notification.
    pub fn on_price_update(&self, symbol: &str, ticker: BookTicker) {
        if !ticker.is_valid() {
            trace!(symbol, "invalid_ticker_dropped");
            return;
        }
        self.tickers.write().insert(symbol.to_string(), ticker);
        trace!(
            symbol,
            bid = %ticker.bid_price,
            ask = %ticker.ask_price,
            "book_ticker"
        );
        self.changed.notify_one();
    }

    /// Suspend until the next accepted price change.
    ///
    /// Cancel-safe: dropping the future (e.g. losing a `select!`) leaves any
    /// stored permit for the next call.
    pub async fn wait_for_change(&self) {
        self.changed.notified().await;
    }

    /// Shallow copy of the current tickers.
    pub fn snapshot(&self) -> HashMap<String, BookTicker> {
        self.tickers.read().clone()
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}
