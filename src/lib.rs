//! Triarb: Triangular Arbitrage Engine
//!
//! Continuously evaluates configured leg cycles for cross-rate arbitrage as
//! live prices change and, on a positive post-rounding spread, drives the
//! three order placements while tracking their asynchronous lifecycle.
//!
//! The exchange connectivity layer lives behind [`exchange::ExchangeClient`];
//! everything in this crate is venue-agnostic.

pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod market;
pub mod orders;
pub mod strategy;
pub mod worker;
