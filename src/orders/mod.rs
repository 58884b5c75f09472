//! Order Placement & Lifecycle Tracking
//! Mission: Turn the push-based order-update firehose into one consumable
//! stream per in-flight order

mod tracker;
mod trade;

pub use tracker::{OrderTracker, OrderUpdates};
pub use trade::{Trade, TradeBuilder};
