//! Exchange Collaborator Boundary
//! Mission: One trait between the engine core and whatever speaks to the venue
//! Philosophy: The core never sees a socket; it sees prices, precisions and
//! order updates

pub mod paper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::orders::Trade;

/// Pair separator used in configured pair names ("BTC/USDT").
pub const PAIR_SEPARATOR: char = '/';

// ============================================================================
// Symbols
// ============================================================================

/// A resolved trading pair.
///
/// Identity is the exchange-formatted `name` ("BTCUSDT"); `base`/`quote` are
/// kept for side derivation. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub base: String,
    pub quote: String,
    pub name: String,
}

impl Symbol {
    /// Parse a configured `"BASE/QUOTE"` pair into a resolved symbol.
    pub fn parse(pair: &str) -> Result<Self, EngineError> {
        let mut parts = pair.split(PAIR_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Ok(Self {
                    base: base.to_string(),
                    quote: quote.to_string(),
                    name: format!("{}{}", base, quote),
                })
            }
            _ => Err(EngineError::configuration(format!(
                "malformed pair '{}', expected BASE/QUOTE",
                pair
            ))),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ============================================================================
// Market data
// ============================================================================

/// Top-of-book snapshot for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookTicker {
    pub ask_price: Decimal,
    pub ask_qty: Decimal,
    pub bid_price: Decimal,
    pub bid_qty: Decimal,
}

impl BookTicker {
    pub fn new(ask_price: Decimal, ask_qty: Decimal, bid_price: Decimal, bid_qty: Decimal) -> Self {
        Self {
            ask_price,
            ask_qty,
            bid_price,
            bid_qty,
        }
    }

    /// A ticker is usable only when all four fields are strictly positive.
    pub fn is_valid(&self) -> bool {
        self.ask_price > Decimal::ZERO
            && self.ask_qty > Decimal::ZERO
            && self.bid_price > Decimal::ZERO
            && self.bid_qty > Decimal::ZERO
    }
}

/// Rounding increments for one pair, expressed as decimal digit counts.
///
/// Fetched once at worker initialization and immutable for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub base_dp: u32,
    pub quote_dp: u32,
}

// ============================================================================
// Order vocabulary
// ============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Time-in-force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeInForce {
    /// Good-til-cancelled (default)
    #[default]
    Gtc,
    /// Immediate-or-cancel
    Ioc,
    /// Fill-or-kill
    Fok,
}

/// Exchange-reported order status.
///
/// `Filled` and `Canceled` are terminal: no further updates are expected for
/// the order and its tracked stream closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// One push-feed update for a live order.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub client_order_id: String,
    pub symbol: String,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Client trait
// ============================================================================

/// Callback invoked by the connectivity layer on every book-ticker tick.
pub type PriceCallback = Arc<dyn Fn(&str, BookTicker) + Send + Sync>;

/// Callback invoked by the connectivity layer on every order update.
pub type OrderCallback = Arc<dyn Fn(OrderUpdate) + Send + Sync>;

/// Everything the engine core needs from the venue.
///
/// Implementations live in the (out of scope) connectivity layer; the core
/// ships only [`paper::PaperExchange`]. Transient failures surface as
/// `EngineError::Client` / `None` / `false` and are absorbed by callers;
/// see the error-propagation policy in [`crate::error`].
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// One-shot best bid/ask fetch, keyed by exchange-formatted symbol name.
    async fn fetch_prices(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<String, BookTicker>, EngineError>;

    /// Per-pair rounding increments, keyed by exchange-formatted symbol name.
    async fn fetch_precisions(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<String, Precision>, EngineError>;

    /// Subscribe `on_tick` to book-ticker changes for `symbols`.
    /// Returns false if the subscription could not be established.
    async fn subscribe_price_changes(&self, symbols: &[Symbol], on_tick: PriceCallback) -> bool;

    /// Subscribe `on_update` to the account's order-update stream.
    async fn subscribe_order_updates(&self, on_update: OrderCallback) -> bool;

    /// Submit an order. `None` signals submission failure (rejected or
    /// malformed), logged by the implementation and never thrown.
    async fn submit_order(&self, trade: &Trade) -> Option<OrderUpdate>;

    /// Request cancellation of a live order by client order id.
    async fn cancel_order(&self, client_order_id: &str) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_parse() {
        let s = Symbol::parse("BTC/USDT").unwrap();
        assert_eq!(s.base, "BTC");
        assert_eq!(s.quote, "USDT");
        assert_eq!(s.name, "BTCUSDT");
    }

    #[test]
    fn test_symbol_parse_rejects_malformed() {
        assert!(Symbol::parse("BTCUSDT").is_err());
        assert!(Symbol::parse("BTC/").is_err());
        assert!(Symbol::parse("/USDT").is_err());
        assert!(Symbol::parse("BTC/USDT/ETH").is_err());
    }

    #[test]
    fn test_ticker_validity() {
        let good = BookTicker::new(dec!(50000), dec!(1), dec!(49990), dec!(2));
        assert!(good.is_valid());

        let zero_qty = BookTicker::new(dec!(50000), dec!(0), dec!(49990), dec!(2));
        assert!(!zero_qty.is_valid());

        assert!(!BookTicker::default().is_valid());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
    }
}
