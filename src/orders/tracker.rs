//! Per-Order Update Demultiplexer
//! Mission: One queue per in-flight client order id, fed by a single push
//! stream, drained by the worker that placed the order
//! Philosophy: Register before you submit; an update that arrives between
//! submission and registration must have somewhere to land

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::exchange::{ExchangeClient, OrderUpdate};
use crate::orders::Trade;

/// Consumable status stream for one tracked order.
///
/// Yields each update as it arrives and ends after the first terminal status
/// (`Filled`/`Canceled`); the tracker drops the sender at that point. Not
/// restartable.
pub struct OrderUpdates {
    rx: mpsc::UnboundedReceiver<OrderUpdate>,
}

impl OrderUpdates {
    /// Next status update, or `None` once the order reached a terminal
    /// status and the queue drained.
    pub async fn next(&mut self) -> Option<OrderUpdate> {
        self.rx.recv().await
    }
}

/// Maps client order ids to live status queues.
///
/// Single-writer (the order feed) / single-reader (the worker that placed
/// the order) per queue; the registry lock is held only for map access.
pub struct OrderTracker {
    client: Arc<dyn ExchangeClient>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<OrderUpdate>>>,
}

impl OrderTracker {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            client,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Submit `trade` and return its status stream.
    ///
    /// The queue is registered under the locally generated client order id
    /// *before* submission, so a fast exchange cannot race an update past
    /// the registration. `None` means submission failure (the client
    /// returned no confirmed order); no status will ever be produced and the
    /// registration is rolled back.
    pub async fn place_and_track(&self, trade: &Trade) -> Option<OrderUpdates> {
        let id = trade.client_order_id().to_string();

        let (tx, rx) = mpsc::unbounded_channel();
        if self.queues.lock().insert(id.clone(), tx).is_some() {
            // Uuid collision would be a bug upstream; refuse to double-track.
            error!(client_order_id = %id, "duplicate client order id, refusing to track");
            return None;
        }

        match self.client.submit_order(trade).await {
            Some(order) => {
                debug!(
                    client_order_id = %id,
                    symbol = %order.symbol,
                    status = %order.status,
                    "order_submitted"
                );
                Some(OrderUpdates { rx })
            }
            None => {
                self.queues.lock().remove(&id);
                warn!(
                    client_order_id = %id,
                    symbol = %trade.symbol(),
                    "order_submission_failed"
                );
                None
            }
        }
    }

    /// Route one push-feed update to its queue.
    ///
    /// Updates for unknown ids are dropped: either the order was never
    /// tracked or it already reached a terminal status and was released.
    pub fn on_order_update(&self, update: OrderUpdate) {
        let mut queues = self.queues.lock();
        let Some(tx) = queues.get(&update.client_order_id) else {
            debug!(
                client_order_id = %update.client_order_id,
                status = %update.status,
                "untracked_order_update_dropped"
            );
            return;
        };

        let terminal = update.status.is_terminal();
        let id = update.client_order_id.clone();
        if tx.send(update).is_err() {
            // Reader went away (worker cancelled mid-drain); release the slot.
            queues.remove(&id);
            return;
        }
        if terminal {
            queues.remove(&id);
        }
    }

    /// Number of orders currently tracked.
    pub fn in_flight(&self) -> usize {
        self.queues.lock().len()
    }

    /// Request exchange-side cancellation of one tracked order.
    ///
    /// The queue stays registered: the exchange-pushed `Canceled` status is
    /// what terminates the stream.
    pub async fn cancel(&self, client_order_id: &str) {
        if !self.queues.lock().contains_key(client_order_id) {
            return;
        }
        if let Err(e) = self.client.cancel_order(client_order_id).await {
            error!(client_order_id, error = %e, "order_cancel_failed");
        }
    }

    /// Request cancellation of every tracked order (shutdown path).
    pub async fn cancel_all(&self) {
        let ids: Vec<String> = self.queues.lock().keys().cloned().collect();
        for id in ids {
            self.cancel(&id).await;
        }
    }
}
