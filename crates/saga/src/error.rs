//! Saga error types.

use domain::{DomainError, PolicyError};
use thiserror::Error;

/// Errors that can occur during saga operations.
///
/// Step failures are recorded in the saga log, not returned from
/// [`SagaOrchestrator::execute`](crate::SagaOrchestrator::execute); only
/// repository failures escape it.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A step refused to proceed.
    #[error("{0}")]
    Step(String),

    /// A step needed a context key that no earlier step provided.
    #[error("Missing saga context key: {0}")]
    MissingContext(String),

    /// The inventory service refused or failed a request.
    #[error("Inventory service error: {0}")]
    Inventory(String),

    /// The payment service refused or failed a request.
    #[error("Payment service error: {0}")]
    Payment(String),

    /// A command issued by a step failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The saga log could not be read or written.
    #[error("Saga log repository error: {0}")]
    Repository(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No saga log with this id.
    #[error("Saga not found: {0}")]
    NotFound(String),
}

impl From<PolicyError> for SagaError {
    fn from(e: PolicyError) -> Self {
        SagaError::Domain(e.into())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
