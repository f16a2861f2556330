//! Insurance policies stored as tagged documents.
//!
//! A policy is persisted as a [`PolicyDocument`]: an id, a discriminant such
//! as `"AUTO"` and a JSON body. The [`PolicyRegistry`] maps each discriminant
//! to the decoder for its concrete type; it is built once at startup and an
//! unregistered discriminant is an error.

mod model;
mod registry;
mod service;
mod store;

pub use model::{AutoPolicy, HealthPolicy, LifePolicy, Policy, PolicyDocument};
pub use registry::{PolicyDecoder, PolicyRegistry};
pub use service::PolicyService;
pub use store::{InMemoryPolicyStore, PolicyStore};

use thiserror::Error;

use crate::error::DomainError;
use crate::money::Money;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Unknown policy type: {0}")]
    UnknownType(String),

    #[error("Policy not found: {0}")]
    NotFound(String),

    #[error("Claim payment of {amount} exceeds remaining coverage {remaining}")]
    CoverageExceeded { amount: Money, remaining: Money },

    #[error("Claim payment must be positive")]
    NonPositivePayment,

    #[error("Policy document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl From<PolicyError> for DomainError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::UnknownType(_) | PolicyError::NonPositivePayment => {
                DomainError::Validation(e.to_string())
            }
            PolicyError::NotFound(id) => DomainError::NotFound {
                aggregate_type: "Policy",
                aggregate_id: id.into(),
            },
            PolicyError::CoverageExceeded { .. } => DomainError::BusinessRule(e.to_string()),
            PolicyError::Document(e) => DomainError::Serialization(e),
        }
    }
}
