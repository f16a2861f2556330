//! Order lifecycle states.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Placed ──► InventoryReserved ──► PaymentProcessed ──► Confirmed ──► Shipped
///   │               │                     │
///   └───────────────┴─────────────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Placed,
    InventoryReserved,
    PaymentProcessed,
    Confirmed,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    pub fn can_reserve_inventory(&self) -> bool {
        matches!(self, OrderStatus::Placed)
    }

    pub fn can_process_payment(&self) -> bool {
        matches!(self, OrderStatus::InventoryReserved)
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::PaymentProcessed)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    /// Orders can be cancelled until they are confirmed.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Placed | OrderStatus::InventoryReserved | OrderStatus::PaymentProcessed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::InventoryReserved => "INVENTORY_RESERVED",
            OrderStatus::PaymentProcessed => "PAYMENT_PROCESSED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_allowed_until_confirmation() {
        assert!(OrderStatus::Placed.can_cancel());
        assert!(OrderStatus::InventoryReserved.can_cancel());
        assert!(OrderStatus::PaymentProcessed.can_cancel());
        assert!(!OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn serde_names_match_display() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::InventoryReserved,
            OrderStatus::PaymentProcessed,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::json!(status.as_str()));
        }
    }
}
