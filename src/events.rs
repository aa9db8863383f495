use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Events emitted by the checkout and order services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    ShippingAddressUpdated {
        order_id: Uuid,
        address_id: Uuid,
    },
    CouponRedeemed {
        coupon_id: Uuid,
        order_id: Uuid,
        user_id: Uuid,
        discount_amount: Decimal,
    },
    InventoryDecremented {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    InventoryRestored {
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    },
    PaymentAttemptCreated {
        order_id: Uuid,
        attempt_id: Uuid,
        method: String,
    },
    PaymentCaptured {
        order_id: Uuid,
        attempt_id: Uuid,
        amount: Decimal,
        captured_at: DateTime<Utc>,
    },
    PaymentFailed {
        order_id: Uuid,
        attempt_id: Uuid,
        reason: String,
    },
}

/// Sends events to the application's event processing pipeline.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing the failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a full or closed channel is logged, never fatal.
    /// State-changing operations use this so event delivery problems do not
    /// fail already-committed work.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "Event delivery failed");
        }
    }
}

/// Creates an event channel pair with the given buffer size.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (sender, mut rx) = channel(8);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = channel(1);
        drop(rx);

        // Must not panic or error out.
        sender.send_or_log(Event::OrderCancelled(Uuid::new_v4())).await;
    }
}
