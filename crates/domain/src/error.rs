//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::projection::ProjectionError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input, e.g. a non-positive amount.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The command is not allowed in the aggregate's current state.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Another writer appended this version first. Reload and retry.
    #[error("Concurrency conflict: {aggregate_id} already has version {version}")]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        version: Version,
    },

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// Replay was asked to rebuild an aggregate from no events.
    #[error("Cannot replay {aggregate_id} from an empty event list")]
    EmptyHistory { aggregate_id: AggregateId },

    /// A replayed event does not directly follow the previous one.
    #[error("Out-of-sequence event: expected version {expected}, found {found}")]
    OutOfSequence { expected: Version, found: Version },

    /// A read model failed to apply an event.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::ConcurrencyConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }
}

impl From<EventStoreError> for DomainError {
    fn from(e: EventStoreError) -> Self {
        match e {
            EventStoreError::ConcurrencyConflict {
                aggregate_id,
                version,
                ..
            } => DomainError::ConcurrencyConflict {
                aggregate_id,
                version,
            },
            EventStoreError::Serialization(e) => DomainError::Serialization(e),
            other => DomainError::EventStore(other),
        }
    }
}
