//! Typed events and their envelope codec.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventId, Version};

use crate::aggregate::DomainEvent;
use crate::error::DomainError;

/// A domain event together with its position in the aggregate's history.
#[derive(Debug, Clone)]
pub struct Event<P> {
    pub event_id: EventId,
    pub aggregate_id: AggregateId,
    pub version: Version,
    pub occurred_at: DateTime<Utc>,
    pub payload: P,
}

impl<P: DomainEvent> Event<P> {
    /// Creates a new event stamped with a fresh id and the current time.
    pub fn new(aggregate_id: AggregateId, version: Version, payload: P) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_id,
            version,
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Encodes the event for storage.
    pub fn to_envelope(&self, aggregate_type: &str) -> Result<EventEnvelope, DomainError> {
        Ok(EventEnvelope::builder()
            .event_id(self.event_id)
            .aggregate_id(self.aggregate_id.clone())
            .aggregate_type(aggregate_type)
            .event_type(self.payload.event_type())
            .version(self.version)
            .occurred_at(self.occurred_at)
            .payload(&self.payload)?
            .build()?)
    }

    /// Decodes a stored event.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, DomainError> {
        Ok(Self {
            event_id: envelope.event_id,
            aggregate_id: envelope.aggregate_id.clone(),
            version: envelope.version,
            occurred_at: envelope.occurred_at,
            payload: serde_json::from_value(envelope.payload.clone())?,
        })
    }
}
