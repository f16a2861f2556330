//! The read-side seam: anything that folds stored events into a read model.

use async_trait::async_trait;
use event_store::EventEnvelope;
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// A projection that processes events and updates a read model.
///
/// `project` is called once per event, in event order for a given aggregate.
/// It must handle every event type of the streams it is fed from; events of
/// other streams are ignored. `reset` empties the read model so that a full
/// replay rebuilds it.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Applies a single event to the read model.
    async fn project(&self, event: &EventEnvelope) -> Result<(), ProjectionError>;

    /// Resets the read model to its initial, empty state.
    async fn reset(&self) -> Result<(), ProjectionError>;
}
