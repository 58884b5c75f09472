//! Spot Trade Variants
//! Mission: Describe exactly what gets sent to the exchange, nothing more
//! Philosophy: A tagged union over order kinds beats a class hierarchy:
//! each variant carries only the fields it needs, and the builder refuses
//! to construct anything incomplete

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::EngineError;
use crate::exchange::{Side, TimeInForce};

/// A spot order ready for submission.
///
/// Identity is `client_order_id`, generated locally at build time so the
/// tracker can register its queue before the exchange ever sees the order.
#[derive(Debug, Clone)]
pub enum Trade {
    Limit {
        client_order_id: String,
        symbol: String,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    },
    Market {
        client_order_id: String,
        symbol: String,
        side: Side,
        quantity: Decimal,
    },
    StopLoss {
        client_order_id: String,
        symbol: String,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        stop_price: Decimal,
    },
}

impl Trade {
    pub fn client_order_id(&self) -> &str {
        match self {
            Trade::Limit {
                client_order_id, ..
            }
            | Trade::Market {
                client_order_id, ..
            }
            | Trade::StopLoss {
                client_order_id, ..
            } => client_order_id,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Trade::Limit { symbol, .. }
            | Trade::Market { symbol, .. }
            | Trade::StopLoss { symbol, .. } => symbol,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Trade::Limit { side, .. }
            | Trade::Market { side, .. }
            | Trade::StopLoss { side, .. } => *side,
        }
    }

    pub fn quantity(&self) -> Decimal {
        match self {
            Trade::Limit { quantity, .. }
            | Trade::Market { quantity, .. }
            | Trade::StopLoss { quantity, .. } => *quantity,
        }
    }

    /// Limit price, if the variant carries one.
    pub fn price(&self) -> Option<Decimal> {
        match self {
            Trade::Limit { price, .. } | Trade::StopLoss { price, .. } => Some(*price),
            Trade::Market { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Trade::Limit { .. } => "LIMIT",
            Trade::Market { .. } => "MARKET",
            Trade::StopLoss { .. } => "STOP_LOSS",
        }
    }
}

/// Validating builder for [`Trade`].
///
/// Defaults to a GTC limit order; `market()` switches the kind, setting a
/// stop price switches to stop-loss. `build` validates required fields up
/// front instead of letting a half-formed order reach submission.
#[derive(Debug, Default)]
pub struct TradeBuilder {
    symbol: Option<String>,
    side: Option<Side>,
    quantity: Option<Decimal>,
    price: Option<Decimal>,
    stop_price: Option<Decimal>,
    time_in_force: TimeInForce,
    market: bool,
}

impl TradeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn market(mut self) -> Self {
        self.market = true;
        self
    }

    pub fn build(self) -> Result<Trade, EngineError> {
        let symbol = self
            .symbol
            .filter(|s| !s.is_empty())
            .ok_or(EngineError::InvalidTrade("symbol is required"))?;
        let side = self.side.ok_or(EngineError::InvalidTrade("side is required"))?;
        let quantity = self
            .quantity
            .ok_or(EngineError::InvalidTrade("quantity is required"))?;
        if quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidTrade("quantity must be positive"));
        }

        let client_order_id = Uuid::new_v4().to_string();

        if self.market {
            if self.stop_price.is_some() {
                return Err(EngineError::UnsupportedOrder("stop market"));
            }
            return Ok(Trade::Market {
                client_order_id,
                symbol,
                side,
                quantity,
            });
        }

        let price = self
            .price
            .ok_or(EngineError::InvalidTrade("limit price is required"))?;
        if price <= Decimal::ZERO {
            return Err(EngineError::InvalidTrade("limit price must be positive"));
        }

        match self.stop_price {
            Some(stop_price) => {
                if stop_price <= Decimal::ZERO {
                    return Err(EngineError::InvalidTrade("stop price must be positive"));
                }
                Ok(Trade::StopLoss {
                    client_order_id,
                    symbol,
                    side,
                    quantity,
                    price,
                    stop_price,
                })
            }
            None => Ok(Trade::Limit {
                client_order_id,
                symbol,
                side,
                quantity,
                price,
                time_in_force: self.time_in_force,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_build_limit_trade() {
        let trade = TradeBuilder::new()
            .symbol("BTCUSDT")
            .side(Side::Buy)
            .quantity(dec!(0.002))
            .price(dec!(50000))
            .build()
            .unwrap();

        assert_eq!(trade.kind(), "LIMIT");
        assert_eq!(trade.symbol(), "BTCUSDT");
        assert_eq!(trade.side(), Side::Buy);
        assert_eq!(trade.quantity(), dec!(0.002));
        assert_eq!(trade.price(), Some(dec!(50000)));
        assert!(!trade.client_order_id().is_empty());
    }

    #[test]
    fn test_build_generates_unique_client_ids() {
        let build = || {
            TradeBuilder::new()
                .symbol("ETHUSDT")
                .side(Side::Sell)
                .quantity(dec!(1))
                .price(dec!(2500))
                .build()
                .unwrap()
        };
        assert_ne!(build().client_order_id(), build().client_order_id());
    }

    #[test]
    fn test_build_stop_loss() {
        let trade = TradeBuilder::new()
            .symbol("BTCUSDT")
            .side(Side::Sell)
            .quantity(dec!(0.01))
            .price(dec!(49000))
            .stop_price(dec!(49100))
            .build()
            .unwrap();
        assert_eq!(trade.kind(), "STOP_LOSS");
    }

    #[test]
    fn test_build_market_has_no_price() {
        let trade = TradeBuilder::new()
            .symbol("BTCUSDT")
            .side(Side::Buy)
            .quantity(dec!(0.01))
            .market()
            .build()
            .unwrap();
        assert_eq!(trade.kind(), "MARKET");
        assert_eq!(trade.price(), None);
    }

    #[test]
    fn test_build_rejects_missing_fields() {
        assert!(TradeBuilder::new().build().is_err());

        // missing price on a limit order
        let res = TradeBuilder::new()
            .symbol("BTCUSDT")
            .side(Side::Buy)
            .quantity(dec!(1))
            .build();
        assert!(res.is_err());

        // non-positive quantity
        let res = TradeBuilder::new()
            .symbol("BTCUSDT")
            .side(Side::Buy)
            .quantity(dec!(0))
            .price(dec!(1))
            .build();
        assert!(res.is_err());
    }

    #[test]
    fn test_build_rejects_stop_market() {
        let res = TradeBuilder::new()
            .symbol("BTCUSDT")
            .side(Side::Sell)
            .quantity(dec!(1))
            .stop_price(dec!(100))
            .market()
            .build();
        assert!(matches!(res, Err(EngineError::UnsupportedOrder(_))));
    }
}
