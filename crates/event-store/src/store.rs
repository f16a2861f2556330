use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// An event as seen by the change feed, tagged with its store-wide position.
///
/// Positions increase with append order across all streams of a store. They
/// are what [`CheckpointStore`] persists.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub position: u64,
    pub event: EventEnvelope,
}

/// A change-feed stream of positioned events.
pub type FeedStream = Pin<Box<dyn Stream<Item = Result<FeedEvent>> + Send>>;

/// Append-only event log, partitioned into named streams (one per aggregate
/// kind) and keyed by aggregate identity within a stream.
///
/// Implementations must reject a second event with the same
/// `(aggregate_id, version)` in a stream with
/// [`EventStoreError::ConcurrencyConflict`]. The check belongs to the
/// storage layer so that two racing writers cannot both pass it.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a single event.
    async fn append(&self, stream: &str, event: EventEnvelope) -> Result<()>;

    /// Appends events one after another.
    ///
    /// This is not atomic across events: if the third of five appends fails,
    /// the first two stay committed and the error is returned as is.
    async fn append_all(&self, stream: &str, events: Vec<EventEnvelope>) -> Result<()> {
        for event in events {
            self.append(stream, event).await?;
        }
        Ok(())
    }

    /// Returns every event of an aggregate, ascending by version.
    async fn load_events(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Returns the events of an aggregate with `version > after`, ascending.
    async fn load_events_after_version(
        &self,
        stream: &str,
        aggregate_id: &AggregateId,
        after: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Number of events stored for an aggregate.
    async fn count_events(&self, stream: &str, aggregate_id: &AggregateId) -> Result<u64>;

    /// Streams every event of a stream in append order.
    async fn stream_events(&self, stream: &str) -> Result<EventStream>;
}

/// Storage for aggregate snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Stores a new snapshot. Older snapshots for the same aggregate are kept.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Returns the highest-version snapshot for the aggregate, if any.
    async fn load_latest_snapshot(
        &self,
        aggregate_id: &AggregateId,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>>;
}

/// Tailing subscription over appended events, resumable by position.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Position of the most recently appended event, or 0 for an empty store.
    async fn head_position(&self) -> Result<u64>;

    /// Yields the events of `stream` with a position greater than `after`,
    /// ascending: first those already stored, then new appends as they
    /// happen.
    async fn subscribe_from(&self, stream: &str, after: u64) -> Result<FeedStream>;

    /// Subscribes to events appended to `stream` after this call returns.
    async fn subscribe(&self, stream: &str) -> Result<EventStream> {
        use futures_util::StreamExt;

        let head = self.head_position().await?;
        let events = self.subscribe_from(stream, head).await?;
        Ok(Box::pin(events.map(|r| r.map(|fe| fe.event))))
    }
}

/// Named resume points for change-feed consumers.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last position recorded under `name`, if any.
    async fn load_checkpoint(&self, name: &str) -> Result<Option<u64>>;

    /// Records `position` under `name`, replacing the previous value.
    async fn save_checkpoint(&self, name: &str, position: u64) -> Result<()>;
}

/// Checks an envelope before it is handed to a backend.
pub(crate) fn validate_for_append(event: &EventEnvelope) -> Result<()> {
    if event.version < Version::first() {
        return Err(EventStoreError::InvalidEvent(format!(
            "version must be at least 1, got {}",
            event.version
        )));
    }
    if event.aggregate_id.as_str().is_empty() {
        return Err(EventStoreError::InvalidEvent(
            "aggregate_id must not be empty".to_string(),
        ));
    }
    if event.event_type.is_empty() {
        return Err(EventStoreError::InvalidEvent(
            "event_type must not be empty".to_string(),
        ));
    }
    Ok(())
}
