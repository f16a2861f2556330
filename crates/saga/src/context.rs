//! Key/value context shared by the steps of one saga.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SagaError};

/// Key under which the orchestrator stores the saga id before step 0.
pub const SAGA_ID_KEY: &str = "sagaId";

/// JSON object carried through a saga. Steps read their inputs from it and
/// write outputs that later steps, or compensation, need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaContext(Map<String, Value>);

impl SagaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Builder form of [`put`](Self::put).
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Result<Self> {
        self.put(key, value)?;
        Ok(self)
    }

    /// Reads `key` as `T`. `None` if the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.0
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(SagaError::from)
    }

    /// Reads `key` as `T`, failing with [`SagaError::MissingContext`] if absent.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get(key)?
            .ok_or_else(|| SagaError::MissingContext(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn saga_id(&self) -> Result<String> {
        self.require(SAGA_ID_KEY)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for SagaContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    #[test]
    fn typed_put_and_get() {
        let mut ctx = SagaContext::new();
        ctx.put("amount", Money::from_cents(1_250)).unwrap();
        ctx.put("claimId", "CLM-1").unwrap();

        assert_eq!(
            ctx.get::<Money>("amount").unwrap(),
            Some(Money::from_cents(1_250))
        );
        assert_eq!(ctx.require::<String>("claimId").unwrap(), "CLM-1");
        assert_eq!(ctx.get::<String>("absent").unwrap(), None);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let ctx = SagaContext::new();
        let err = ctx.require::<String>(SAGA_ID_KEY).unwrap_err();
        assert!(matches!(err, SagaError::MissingContext(ref k) if k == "sagaId"));
    }

    #[test]
    fn wrong_type_is_a_serialization_error() {
        let ctx = SagaContext::new().with("amount", "lots").unwrap();
        assert!(matches!(
            ctx.get::<i64>("amount"),
            Err(SagaError::Serialization(_))
        ));
    }

    #[test]
    fn serializes_as_plain_object() {
        let ctx = SagaContext::new().with("a", 1).unwrap();
        assert_eq!(serde_json::to_string(&ctx).unwrap(), r#"{"a":1}"#);
    }
}
