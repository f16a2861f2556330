//! Order aggregate: placement, inventory reservation, payment, shipping.

mod aggregate;
mod events;
mod lines;
mod service;
mod status;

pub use aggregate::Order;
pub use events::OrderEvent;
pub use lines::{OrderLine, PaymentInfo, ShippingAddress};
pub use service::OrderService;
pub use status::OrderStatus;

use thiserror::Error;

use crate::error::DomainError;
use crate::money::Money;

/// Stream holding every order's events.
pub const ORDER_STREAM: &str = "order_events";

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order must contain at least one line")]
    NoLines,

    #[error("Quantity for product {product_id} must be positive")]
    InvalidQuantity { product_id: String },

    #[error("Unit price for product {product_id} must be positive")]
    NonPositivePrice { product_id: String },

    #[error("Order total would overflow")]
    TotalOverflow,

    #[error("Tracking number is required")]
    MissingTrackingNumber,

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has not been placed")]
    NotPlaced,

    #[error("Cannot {action} an order in status {current}")]
    InvalidTransition {
        action: &'static str,
        current: OrderStatus,
    },

    #[error("Payment of {paid} does not match order total {total}")]
    PaymentMismatch { paid: Money, total: Money },
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoLines
            | OrderError::InvalidQuantity { .. }
            | OrderError::NonPositivePrice { .. }
            | OrderError::TotalOverflow
            | OrderError::MissingTrackingNumber => DomainError::Validation(e.to_string()),
            _ => DomainError::BusinessRule(e.to_string()),
        }
    }
}
