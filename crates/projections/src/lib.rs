//! Read models and projections for the CQRS query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`ProjectionProcessor`] for delivering events and rebuilding from history
//! - [`ChangeFeedListener`] for the asynchronous projection path
//! - [`Deduplicated`] for projectors fed by both paths
//! - Seven read model views over the account, claim and order streams
//!
//! The [`Projection`] trait itself lives in the domain crate so that command
//! services can drive projections synchronously.

pub mod dedupe;
pub mod listener;
pub mod processor;
pub mod views;

pub use dedupe::Deduplicated;
pub use domain::{Projection, ProjectionError};
pub use listener::{ChangeFeedListener, ListenerHandle};
pub use processor::ProjectionProcessor;
pub use views::{
    AccountSummary, AccountSummaryView, CategoryStatistics, ClaimDashboardView, ClaimStatisticsView,
    ClaimSummary, LedgerEntry, LedgerEntryType, OrderDashboardView, OrderSummary,
    OrderTimelineEntry, SalesStatistics, SalesStatisticsView, TimelineEntry,
    TransactionLedgerView, TransferDirection, TransferNotification, TransferNotificationView,
};

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
