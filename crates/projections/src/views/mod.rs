//! Read model views for the CQRS query side.

pub mod account_summary;
pub mod claim_dashboard;
pub mod claim_statistics;
pub mod order_dashboard;
pub mod sales_statistics;
pub mod transaction_ledger;
pub mod transfer_notifications;

pub use account_summary::{AccountSummary, AccountSummaryView};
pub use claim_dashboard::{ClaimDashboardView, ClaimSummary, TimelineEntry};
pub use claim_statistics::{CategoryStatistics, ClaimStatisticsView};
pub use order_dashboard::{OrderDashboardView, OrderSummary, OrderTimelineEntry};
pub use sales_statistics::{SalesStatistics, SalesStatisticsView};
pub use transaction_ledger::{LedgerEntry, LedgerEntryType, TransactionLedgerView};
pub use transfer_notifications::{
    TransferDirection, TransferNotification, TransferNotificationView,
};
