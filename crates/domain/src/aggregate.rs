//! Core aggregate and domain event traits.

use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + std::fmt::Debug {
    /// Returns the event type name.
    ///
    /// Must match the serde tag of the variant so that the stored
    /// `event_type` column and the payload discriminant agree.
    fn event_type(&self) -> &'static str;
}

/// State of an event-sourced entity.
///
/// Implementors hold only derived fields. Identity, version and the
/// uncommitted buffer live in [`AggregateRoot`](crate::AggregateRoot).
///
/// Command methods are written as `&self` methods returning
/// `Result<Vec<Self::Event>, Self::Error>`: they validate against the
/// current state and describe what happened, and the root applies the
/// result. A rejected command therefore never touches state.
pub trait Aggregate:
    Default + Clone + Send + Sync + Serialize + DeserializeOwned + std::fmt::Debug + 'static
{
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the aggregate type name stored with events and snapshots.
    fn aggregate_type() -> &'static str;

    /// Returns the event stream this aggregate kind is persisted in.
    fn stream() -> &'static str;

    /// Applies an event to the state.
    ///
    /// Must be deterministic and infallible: events are facts.
    fn apply(&mut self, event: &Self::Event);
}
