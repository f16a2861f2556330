//! External services called by the order fulfillment saga.

pub mod inventory;
pub mod payment;

pub use inventory::{InMemoryInventoryService, InventoryService, Product};
pub use payment::{InMemoryPaymentService, PaymentResult, PaymentService};
