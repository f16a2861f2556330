//! Projection processor for feeding events to projections.

use std::sync::Arc;

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;

use crate::Result;
use domain::Projection;

/// Delivers events from an event store to a set of projections.
///
/// The processor supports:
/// - Single event delivery to every registered projection
/// - Rebuild: resets every projection and replays a whole stream from history
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.register(projection);
        self
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers a single event to all registered projections, in registration
    /// order. Stops at the first failing projection.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.project(event).await?;
            metrics::counter!("projections_events_processed").increment(1);
        }
        Ok(())
    }

    /// Resets every projection, then replays `stream` from the beginning in
    /// append order. Returns the number of events replayed.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self, stream: &str) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }

        let mut events = self.store.stream_events(stream).await?;
        let mut replayed: u64 = 0;

        while let Some(result) = events.next().await {
            let event = result?;
            self.process_event(&event).await?;
            replayed += 1;
        }

        tracing::info!(stream, events_replayed = replayed, "rebuild complete");

        Ok(replayed)
    }
}
