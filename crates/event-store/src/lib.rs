//! Append-only persistence for events and snapshots.
//!
//! - [`EventStore`]: per-stream event log with storage-enforced
//!   `(aggregate_id, version)` uniqueness
//! - [`SnapshotStore`]: snapshot history, latest-by-version lookup
//! - [`ChangeFeed`]: position-ordered tailing subscription used by
//!   asynchronous projectors, with [`CheckpointStore`] resume points
//!
//! Two backends are provided: [`InMemoryEventStore`] and [`PostgresEventStore`].

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{
    ChangeFeed, CheckpointStore, EventStore, EventStream, FeedEvent, FeedStream, SnapshotStore,
};
