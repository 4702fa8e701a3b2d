//! Fire-and-forget domain events.
//!
//! Events are dispatched after a transaction commits and carry no
//! transactional guarantee: a failed send is logged and swallowed. Consumers
//! run `process_events` on the receiving end of the channel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryReceived {
        tenant_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
    },
    InventoryAdjusted {
        tenant_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
        new_on_hand: Decimal,
    },
    InventoryTransferred {
        tenant_id: Uuid,
        product_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        quantity: Decimal,
    },
    InventoryReserved {
        tenant_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
        order_id: Uuid,
        reservation_id: Uuid,
        quantity: Decimal,
    },
    ReservationCommitted {
        tenant_id: Uuid,
        reservation_id: Uuid,
        quantity: Decimal,
    },
    ReservationReleased {
        tenant_id: Uuid,
        reservation_id: Uuid,
        reason: Option<String>,
    },
    ReservationExpired {
        tenant_id: Uuid,
        reservation_id: Uuid,
        expired_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Spawn this alongside the
/// services when there is no real consumer wired up.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "domain event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn events_serialize_with_variant_names() {
        let event = Event::InventoryReserved {
            tenant_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            quantity: dec!(3),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("InventoryReserved"));
        assert!(json.contains("reservation_id"));
    }
}
