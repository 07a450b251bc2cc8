//! Domain events raised by the product aggregate.

use common::Sku;
use serde::{Deserialize, Serialize};

/// Raised when an order line cannot be allocated to any batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStockEvent {
    pub sku: Sku,
}

/// Every event the product aggregate can raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    OutOfStock(OutOfStockEvent),
}

/// Discriminant used to register handlers for a kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OutOfStock,
}

impl DomainEvent {
    pub fn out_of_stock(sku: impl Into<Sku>) -> Self {
        DomainEvent::OutOfStock(OutOfStockEvent { sku: sku.into() })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::OutOfStock(_) => EventKind::OutOfStock,
        }
    }

    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OutOfStock => "OutOfStock",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_stock_event_type() {
        let event = DomainEvent::out_of_stock("SMALL-FORK");
        assert_eq!(event.event_type(), "OutOfStock");
        assert_eq!(event.kind(), EventKind::OutOfStock);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DomainEvent::out_of_stock("SMALL-FORK");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "OutOfStock", "sku": "SMALL-FORK" })
        );
    }
}
