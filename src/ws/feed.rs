//! In-process fan-out of order changes to realtime subscribers

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::orders::lifecycle::OrderStatus;

/// Capacity of the broadcast channel; slower subscribers get a lag error
const FEED_CAPACITY: usize = 256;

/// A status change that was committed to the database
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub previous: OrderStatus,
    pub at: DateTime<Utc>,
}

/// Broadcast hub for order events
#[derive(Clone)]
pub struct OrderFeed {
    tx: broadcast::Sender<OrderEvent>,
}

impl OrderFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish an event; having no subscribers is fine
    pub fn publish(&self, event: OrderEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.tx.subscribe()
    }

    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for OrderFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(store_id: Uuid) -> OrderEvent {
        OrderEvent {
            order_id: Uuid::new_v4(),
            store_id,
            customer_id: Uuid::new_v4(),
            status: OrderStatus::Confirmed,
            previous: OrderStatus::Pending,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let feed = OrderFeed::new();
        let mut rx = feed.subscribe();
        assert_eq!(feed.subscribers(), 1);

        let store = Uuid::new_v4();
        feed.publish(event(store));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.store_id, store);
        assert_eq!(received.status, OrderStatus::Confirmed);
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let feed = OrderFeed::new();
        feed.publish(event(Uuid::new_v4()));
        assert_eq!(feed.subscribers(), 0);
    }
}
