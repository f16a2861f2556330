//! Domain layer for the event-sourcing system.
//!
//! This crate provides the core domain abstractions including:
//! - [`Aggregate`] and [`DomainEvent`] traits, with [`AggregateRoot`] holding
//!   identity, version and uncommitted events
//! - [`CommandService`]: load, validate and apply, append, project, snapshot
//! - the [`Projection`] seam the read side implements
//! - the account ledger, insurance claims, orders and the policy registry

pub mod account;
pub mod aggregate;
pub mod claim;
pub mod command;
pub mod error;
pub mod event;
pub mod money;
pub mod order;
pub mod policy;
pub mod projection;
pub mod root;

pub use account::{ACCOUNT_STREAM, AccountError, AccountEvent, AccountService, BankAccount};
pub use aggregate::{Aggregate, DomainEvent};
pub use claim::{
    CLAIM_STREAM, ClaimError, ClaimEvent, ClaimProcess, ClaimService, ClaimStatus, FraudRisk,
};
pub use command::{CommandResult, CommandService, DEFAULT_SNAPSHOT_INTERVAL};
pub use error::DomainError;
pub use event::Event;
pub use money::Money;
pub use order::{
    ORDER_STREAM, Order, OrderError, OrderEvent, OrderLine, OrderService, OrderStatus,
    PaymentInfo, ShippingAddress,
};
pub use policy::{
    AutoPolicy, HealthPolicy, InMemoryPolicyStore, LifePolicy, Policy, PolicyDocument,
    PolicyError, PolicyRegistry, PolicyService, PolicyStore,
};
pub use projection::{Projection, ProjectionError};
pub use root::AggregateRoot;
