use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Unique identifier for a single stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event in its aggregate's history.
///
/// Versions form a gapless sequence starting at 1. `Version::initial()` (0)
/// is the version of an aggregate that has no events yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of an aggregate before its first event.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version carried by an aggregate's first event.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true for a positive version that is a multiple of `interval`.
    ///
    /// An interval of zero never matches.
    pub fn is_multiple_of(&self, interval: u64) -> bool {
        interval > 0 && self.0 > 0 && (self.0 as u64).is_multiple_of(interval)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A stored event: the discriminated payload plus everything needed to
/// place it in its aggregate's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Payload discriminant (e.g. "FundsDeposited", "ClaimFiled").
    pub event_type: String,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// Kind of aggregate (e.g. "BankAccount", "ClaimProcess").
    pub aggregate_type: String,

    /// Version of the aggregate after this event.
    pub version: Version,

    /// When the fact happened.
    pub occurred_at: DateTime<Utc>,

    /// Event payload as JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Builder for [`EventEnvelope`].
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    occurred_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: impl Into<AggregateId>) -> Self {
        self.aggregate_id = Some(id.into());
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the envelope, rejecting missing fields and versions below 1.
    pub fn build(self) -> Result<EventEnvelope, EventStoreError> {
        let missing = |field: &str| EventStoreError::InvalidEvent(format!("{field} is required"));

        let version = self.version.ok_or_else(|| missing("version"))?;
        if version < Version::first() {
            return Err(EventStoreError::InvalidEvent(format!(
                "version must be at least 1, got {version}"
            )));
        }

        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.ok_or_else(|| missing("event_type"))?,
            aggregate_id: self.aggregate_id.ok_or_else(|| missing("aggregate_id"))?,
            aggregate_type: self.aggregate_type.ok_or_else(|| missing("aggregate_type"))?,
            version,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or_else(|| missing("payload"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn version_multiple_of_interval() {
        assert!(Version::new(10).is_multiple_of(10));
        assert!(Version::new(20).is_multiple_of(10));
        assert!(!Version::new(11).is_multiple_of(10));
        assert!(!Version::initial().is_multiple_of(10));
        assert!(!Version::new(10).is_multiple_of(0));
    }

    #[test]
    fn builder_fills_defaults() {
        let payload = serde_json::json!({"type": "FundsDeposited", "data": {"amount": 500}});

        let envelope = EventEnvelope::builder()
            .event_type("FundsDeposited")
            .aggregate_id("ACC-001")
            .aggregate_type("BankAccount")
            .version(Version::new(2))
            .payload_raw(payload.clone())
            .build()
            .unwrap();

        assert_eq!(envelope.event_type, "FundsDeposited");
        assert_eq!(envelope.aggregate_id.as_str(), "ACC-001");
        assert_eq!(envelope.version, Version::new(2));
        assert_eq!(envelope.payload, payload);
    }

    #[test]
    fn builder_rejects_missing_fields() {
        let result = EventEnvelope::builder().version(Version::first()).build();
        assert!(matches!(result, Err(EventStoreError::InvalidEvent(_))));
    }

    #[test]
    fn builder_rejects_version_zero() {
        let result = EventEnvelope::builder()
            .event_type("AccountOpened")
            .aggregate_id("ACC-001")
            .aggregate_type("BankAccount")
            .version(Version::initial())
            .payload_raw(serde_json::json!({}))
            .build();

        match result {
            Err(EventStoreError::InvalidEvent(msg)) => assert!(msg.contains("at least 1")),
            other => panic!("expected InvalidEvent, got {other:?}"),
        }
    }
}
