//! Arbitrage Engine
//! Mission: Given a price snapshot, decide whether one pass around the leg
//! cycle nets more quote currency than it costs
//! Philosophy: Conservative by construction. Fees compound per leg, order
//! quantities round up and proceeds round down; a positive spread that
//! survives that treatment is real edge

pub mod math;

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::error::EngineError;
use crate::exchange::{BookTicker, Precision, Side, Symbol};
use crate::orders::{Trade, TradeBuilder};

/// Legs in a triangular cycle. Partial cycles are unsupported.
pub const CYCLE_LEN: usize = 3;

/// An ordered triangular cycle plus its sizing inputs.
///
/// Immutable after construction; sides are derived once at engine build.
#[derive(Debug, Clone)]
pub struct LegCycle {
    pub symbols: [Symbol; CYCLE_LEN],
    pub holding_asset: String,
    pub order_amount: Decimal,
    pub fee: Decimal,
}

/// Outcome of one evaluation. Overwritten on every price change.
#[derive(Debug, Clone, Default)]
pub struct ArbitrageResult {
    /// Net multiplicative return of one pass, after fees.
    pub ratio: Decimal,
    /// Quote-currency profit after conservative rounding.
    pub spread: Decimal,
    /// Base-asset order quantity per leg.
    pub quantities: [Decimal; CYCLE_LEN],
}

/// Pure cross-rate computation over one leg cycle.
///
/// Holds no mutable state beyond the last computed result and the snapshot
/// it was computed from.
pub struct ArbitrageEngine {
    cycle: LegCycle,
    precisions: HashMap<String, Precision>,
    sides: [Side; CYCLE_LEN],
    result: ArbitrageResult,
    prices: HashMap<String, BookTicker>,
}

impl ArbitrageEngine {
    /// Build the engine for one cycle.
    ///
    /// Fails if a precision is missing for any leg; sizing without the
    /// venue's rounding increments would produce unfillable orders.
    pub fn new(
        cycle: LegCycle,
        precisions: HashMap<String, Precision>,
    ) -> Result<Self, EngineError> {
        for symbol in &cycle.symbols {
            if !precisions.contains_key(&symbol.name) {
                return Err(EngineError::configuration(format!(
                    "missing precision for {}",
                    symbol.name
                )));
            }
        }
        let sides = derive_sides(&cycle);
        Ok(Self {
            cycle,
            precisions,
            sides,
            result: ArbitrageResult::default(),
            prices: HashMap::new(),
        })
    }

    pub fn sides(&self) -> &[Side; CYCLE_LEN] {
        &self.sides
    }

    pub fn result(&self) -> &ArbitrageResult {
        &self.result
    }

    /// Recompute ratio, quantities and spread from a fresh snapshot.
    ///
    /// A snapshot with a missing or not-yet-valid ticker yields a neutral
    /// result (ratio and spread zero), never a panic and never a trade.
    pub fn evaluate(&mut self, snapshot: &HashMap<String, BookTicker>) -> &ArbitrageResult {
        for symbol in &self.cycle.symbols {
            match snapshot.get(&symbol.name) {
                Some(t) if t.is_valid() => {}
                _ => {
                    self.result = ArbitrageResult::default();
                    return &self.result;
                }
            }
        }
        self.prices = snapshot.clone();

        let ratio = self.compute_ratio();
        let (quantities, spread) = self.compute_quantities();
        self.result = ArbitrageResult {
            ratio,
            spread,
            quantities,
        };
        debug!(
            ratio = %self.result.ratio,
            spread = %self.result.spread,
            "arbitrage_evaluated"
        );
        &self.result
    }

    /// Cross-rate ratio: per-leg price factor (1/ask on a buy, bid on a
    /// sell) compounded with `(1 - fee)` per executed leg.
    fn compute_ratio(&self) -> Decimal {
        let mut ratio = Decimal::ONE;
        for (symbol, side) in self.cycle.symbols.iter().zip(self.sides) {
            let price = self.price(&symbol.name, side);
            ratio *= match side {
                Side::Buy => Decimal::ONE / price,
                Side::Sell => price,
            };
        }
        ratio * math::pow(Decimal::ONE - self.cycle.fee, CYCLE_LEN as u32)
    }

    /// Derive per-leg quantities backward from the disposal leg.
    ///
    /// Quantities round up to each leg's base precision so the order always
    /// clears minimum-lot checks. The leg-0 quote cost rounds up and the
    /// leg-2 quote proceeds round down; spread = proceeds - cost.
    fn compute_quantities(&self) -> ([Decimal; CYCLE_LEN], Decimal) {
        let [p0, p1, p2] = &self.cycle.symbols;
        let prec0 = self.precisions[&p0.name];
        let prec2 = self.precisions[&p2.name];
        let base_dp1 = self.precisions[&p1.name].base_dp;

        // Direct cycle only: acquire via legs 0/1, dispose via leg 2.
        let disposal_price = self.price(&p2.name, Side::Sell);
        let bridge_price = self.price(&p1.name, Side::Buy);
        let entry_price = self.price(&p0.name, Side::Buy);

        let qty = math::round_up(self.cycle.order_amount / disposal_price, base_dp1);
        let q0 = math::round_up(qty * bridge_price, prec0.base_dp);
        let quantities = [q0, qty, qty];

        let spent = math::round_up(q0 * entry_price, prec0.quote_dp);
        let received = math::round_down(qty * disposal_price, prec2.quote_dp);

        (quantities, received - spent)
    }

    /// Limit-trade template for one leg of the last computed result.
    ///
    /// Limit price is the best ask (buy) or best bid (sell) seen at
    /// evaluation time.
    pub fn trade_at(&self, leg: usize) -> Result<Trade, EngineError> {
        let symbol = &self.cycle.symbols[leg];
        let side = self.sides[leg];
        TradeBuilder::new()
            .symbol(symbol.name.clone())
            .side(side)
            .quantity(self.result.quantities[leg])
            .price(self.price(&symbol.name, side))
            .build()
    }

    fn price(&self, symbol: &str, side: Side) -> Decimal {
        let ticker = &self.prices[symbol];
        match side {
            Side::Buy => ticker.ask_price,
            Side::Sell => ticker.bid_price,
        }
    }
}

/// Choose each leg's side so that a full pass starts and ends in the
/// holding asset: leg 0 sells only when its base *is* the holding asset,
/// leg 2 buys only when its base is the holding asset, and the middle leg
/// sells when it shares leg 0's base.
fn derive_sides(cycle: &LegCycle) -> [Side; CYCLE_LEN] {
    let [s0, s1, s2] = &cycle.symbols;
    let first = if s0.base == cycle.holding_asset {
        Side::Sell
    } else {
        Side::Buy
    };
    let middle = if s1.base == s0.base {
        Side::Sell
    } else {
        Side::Buy
    };
    let last = if s2.base == cycle.holding_asset {
        Side::Buy
    } else {
        Side::Sell
    };
    [first, middle, last]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn cycle(fee: Decimal) -> LegCycle {
        LegCycle {
            symbols: [
                Symbol::parse("BTC/USDT").unwrap(),
                Symbol::parse("ETH/BTC").unwrap(),
                Symbol::parse("ETH/USDT").unwrap(),
            ],
            holding_asset: "USDT".to_string(),
            order_amount: dec!(100),
            fee,
        }
    }

    fn precisions() -> HashMap<String, Precision> {
        let mut map = HashMap::new();
        map.insert(
            "BTCUSDT".to_string(),
            Precision {
                base_dp: 5,
                quote_dp: 2,
            },
        );
        map.insert(
            "ETHBTC".to_string(),
            Precision {
                base_dp: 3,
                quote_dp: 5,
            },
        );
        map.insert(
            "ETHUSDT".to_string(),
            Precision {
                base_dp: 4,
                quote_dp: 2,
            },
        );
        map
    }

    fn snapshot() -> HashMap<String, BookTicker> {
        let mut map = HashMap::new();
        map.insert(
            "BTCUSDT".to_string(),
            BookTicker::new(dec!(50000), dec!(1), dec!(49990), dec!(1)),
        );
        map.insert(
            "ETHBTC".to_string(),
            BookTicker::new(dec!(0.05), dec!(10), dec!(0.0499), dec!(10)),
        );
        map.insert(
            "ETHUSDT".to_string(),
            BookTicker::new(dec!(2550), dec!(5), dec!(2540), dec!(5)),
        );
        map
    }

    #[test]
    fn test_sides_for_usdt_holding_cycle() {
        let engine = ArbitrageEngine::new(cycle(dec!(0.001)), precisions()).unwrap();
        assert_eq!(*engine.sides(), [Side::Buy, Side::Buy, Side::Sell]);
    }

    #[test]
    fn test_sides_when_holding_asset_is_first_base() {
        // Holding BTC and starting on BTC/USDT flips leg 0 to a sell and the
        // middle leg follows leg 0's base.
        let mut c = cycle(dec!(0));
        c.symbols = [
            Symbol::parse("BTC/USDT").unwrap(),
            Symbol::parse("BTC/ETH").unwrap(),
            Symbol::parse("BTC/EUR").unwrap(),
        ];
        c.holding_asset = "BTC".to_string();
        let mut prec = precisions();
        prec.insert(
            "BTCETH".to_string(),
            Precision {
                base_dp: 3,
                quote_dp: 5,
            },
        );
        prec.insert(
            "BTCEUR".to_string(),
            Precision {
                base_dp: 5,
                quote_dp: 2,
            },
        );
        let engine = ArbitrageEngine::new(c, prec).unwrap();
        assert_eq!(*engine.sides(), [Side::Sell, Side::Sell, Side::Buy]);
    }

    #[test]
    fn test_missing_precision_is_rejected() {
        let mut prec = precisions();
        prec.remove("ETHBTC");
        assert!(ArbitrageEngine::new(cycle(dec!(0.001)), prec).is_err());
    }

    #[test]
    fn test_zero_fee_ratio_is_exact_price_product() {
        let mut engine = ArbitrageEngine::new(cycle(dec!(0)), precisions()).unwrap();
        let result = engine.evaluate(&snapshot());
        // (1/50000) * (1/0.05) * 2540 with no fee dampening
        assert_eq!(result.ratio, dec!(1.016));
    }

    #[test]
    fn test_fee_compounds_per_leg() {
        let mut engine = ArbitrageEngine::new(cycle(dec!(0.001)), precisions()).unwrap();
        let result = engine.evaluate(&snapshot());
        assert_eq!(result.ratio, dec!(1.016) * dec!(0.997002999));
    }

    #[test]
    fn test_quantities_and_spread_scenario() {
        let mut engine = ArbitrageEngine::new(cycle(dec!(0.001)), precisions()).unwrap();
        let result = engine.evaluate(&snapshot()).clone();

        // 100 USDT / 2540 = 0.03937... rounded up at 3 dp -> 0.040 ETH
        assert_eq!(result.quantities[1], dec!(0.040));
        assert_eq!(result.quantities[2], dec!(0.040));
        // 0.040 * 0.05 = 0.002 BTC (already at 5 dp)
        assert_eq!(result.quantities[0], dec!(0.002));
        // spent = 0.002 * 50000 = 100.00; received = 0.040 * 2540 = 101.60
        assert_eq!(result.spread, dec!(1.60));
        assert!(result.spread > Decimal::ZERO);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut engine = ArbitrageEngine::new(cycle(dec!(0.001)), precisions()).unwrap();
        let first = engine.evaluate(&snapshot()).clone();
        let second = engine.evaluate(&snapshot()).clone();
        assert_eq!(first.quantities, second.quantities);
        assert_eq!(first.spread, second.spread);
        assert_eq!(first.ratio, second.ratio);
    }

    #[test]
    fn test_incomplete_snapshot_is_neutral() {
        let mut engine = ArbitrageEngine::new(cycle(dec!(0.001)), precisions()).unwrap();
        let mut snap = snapshot();
        snap.remove("ETHBTC");
        let result = engine.evaluate(&snap);
        assert_eq!(result.ratio, Decimal::ZERO);
        assert_eq!(result.spread, Decimal::ZERO);
    }

    #[test]
    fn test_trade_templates_use_evaluation_prices() {
        let mut engine = ArbitrageEngine::new(cycle(dec!(0.001)), precisions()).unwrap();
        engine.evaluate(&snapshot());

        let leg0 = engine.trade_at(0).unwrap();
        assert_eq!(leg0.symbol(), "BTCUSDT");
        assert_eq!(leg0.side(), Side::Buy);
        assert_eq!(leg0.price(), Some(dec!(50000))); // best ask

        let leg2 = engine.trade_at(2).unwrap();
        assert_eq!(leg2.side(), Side::Sell);
        assert_eq!(leg2.price(), Some(dec!(2540))); // best bid
        assert_eq!(leg2.quantity(), dec!(0.040));
    }
}
