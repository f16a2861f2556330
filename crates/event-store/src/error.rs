use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer already appended this version for the aggregate.
    #[error(
        "Concurrency conflict in stream {stream}: aggregate {aggregate_id} already has version {version}"
    )]
    ConcurrencyConflict {
        stream: String,
        aggregate_id: AggregateId,
        version: Version,
    },

    /// The event is not fit for appending (missing fields, version < 1).
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true if the error signals a lost optimistic-concurrency race.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
