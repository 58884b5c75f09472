//! Decimal Rounding Helpers
//! Mission: Exchange-precision-aware rounding with no binary-float drift

use rust_decimal::{Decimal, RoundingStrategy};

/// Round up (towards +inf for the positive values we deal in) to `dp`
/// fractional digits.
pub fn round_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::AwayFromZero)
}

/// Round down (truncate) to `dp` fractional digits.
pub fn round_down(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

/// Integer power by repeated multiplication.
///
/// Exact over `Decimal`; used for compounding the per-leg fee factor.
pub fn pow(base: Decimal, exp: u32) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..exp {
        result *= base;
    }
    result
}
