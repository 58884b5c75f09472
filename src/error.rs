//! Error Taxonomy for the Arbitrage Engine
//! Mission: Make every failure mode explicit and attributable
//! Philosophy: Transient data errors are absorbed at the boundary; broken
//! configuration and unsupported orders fail fast and loudly

use thiserror::Error;

/// Errors surfaced by the engine core.
///
/// `Client` errors are absorbed at the collaborator boundary: callers log
/// them and treat the call as "no data" (`false`/`None`), they never cross
/// a worker's run loop. `Configuration` errors are fatal to the worker that
/// hits them. `UnsupportedOrder` and `InvalidTrade` abort the current cycle
/// before anything reaches the exchange.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An exchange API call failed (network, auth, rate limit, ...).
    #[error("exchange client error: {0}")]
    Client(String),

    /// The worker is misconfigured (wrong cycle arity, malformed pair,
    /// missing precision).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An order kind the exchange layer does not implement.
    #[error("unsupported order: {0}")]
    UnsupportedOrder(&'static str),

    /// Trade builder validation failed.
    #[error("invalid trade: {0}")]
    InvalidTrade(&'static str),
}

impl EngineError {
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::configuration("expected 3 pairs, got 2");
        assert_eq!(
            err.to_string(),
            "configuration error: expected 3 pairs, got 2"
        );

        let err = EngineError::UnsupportedOrder("iceberg");
        assert_eq!(err.to_string(), "unsupported order: iceberg");
    }
}
