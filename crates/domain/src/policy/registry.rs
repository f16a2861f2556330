use std::collections::HashMap;

use serde::Deserialize;

use super::{AutoPolicy, HealthPolicy, LifePolicy, Policy, PolicyDocument, PolicyError};

/// Decodes a policy body into its concrete type.
pub type PolicyDecoder = fn(&serde_json::Value) -> Result<Policy, serde_json::Error>;

/// Maps a stored discriminant to the decoder for that policy type.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    decoders: HashMap<String, PolicyDecoder>,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry knowing `AUTO`, `HEALTH` and `LIFE`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("AUTO", |body| AutoPolicy::deserialize(body).map(Policy::Auto));
        registry.register("HEALTH", |body| {
            HealthPolicy::deserialize(body).map(Policy::Health)
        });
        registry.register("LIFE", |body| LifePolicy::deserialize(body).map(Policy::Life));
        registry
    }

    /// Registers a decoder, replacing any previous one for the discriminant.
    pub fn register(&mut self, discriminant: impl Into<String>, decoder: PolicyDecoder) {
        self.decoders.insert(discriminant.into(), decoder);
    }

    pub fn is_registered(&self, discriminant: &str) -> bool {
        self.decoders.contains_key(discriminant)
    }

    /// Registered discriminants, sorted.
    pub fn discriminants(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decodes a stored document.
    pub fn decode(&self, document: &PolicyDocument) -> Result<Policy, PolicyError> {
        let decoder = self
            .decoders
            .get(&document.policy_type)
            .ok_or_else(|| PolicyError::UnknownType(document.policy_type.clone()))?;
        Ok(decoder(&document.body)?)
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("discriminants", &self.discriminants())
            .finish()
    }
}
