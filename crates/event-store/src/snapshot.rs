use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, Version};

/// Compacted aggregate state at a given version.
///
/// A snapshot is a cache: it bounds replay cost but never replaces the event
/// log. Later snapshots supersede earlier ones without deleting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: Uuid,

    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g. "BankAccount").
    pub aggregate_type: String,

    /// Version of the last event folded into `state`.
    pub version: Version,

    pub created_at: DateTime<Utc>,

    /// The serialized aggregate state.
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: serde_json::Value,
    ) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            created_at: Utc::now(),
            state,
        }
    }

    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            aggregate_id,
            aggregate_type,
            version,
            serde_json::to_value(state)?,
        ))
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn state_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct AccountState {
        balance: i64,
        holder: String,
    }

    #[test]
    fn state_round_trips_through_snapshot() {
        let state = AccountState {
            balance: 15_000,
            holder: "Wang".to_string(),
        };

        let snapshot =
            Snapshot::from_state(AggregateId::new("ACC-1"), "BankAccount", Version::new(10), &state)
                .unwrap();

        assert_eq!(snapshot.version, Version::new(10));
        assert_eq!(snapshot.aggregate_type, "BankAccount");
        assert_eq!(snapshot.state_as::<AccountState>().unwrap(), state);
    }

    #[test]
    fn each_snapshot_gets_its_own_id() {
        let a = Snapshot::new(AggregateId::new("A"), "T", Version::new(10), serde_json::json!({}));
        let b = Snapshot::new(AggregateId::new("A"), "T", Version::new(10), serde_json::json!({}));
        assert_ne!(a.snapshot_id, b.snapshot_id);
    }
}
