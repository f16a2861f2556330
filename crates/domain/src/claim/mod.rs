//! Insurance claim aggregate and related types.

mod aggregate;
mod events;
mod service;
mod status;

pub use aggregate::ClaimProcess;
pub use events::ClaimEvent;
pub use service::ClaimService;
pub use status::{ClaimStatus, FraudRisk};

use thiserror::Error;

use crate::error::DomainError;
use crate::money::Money;

/// Stream holding every claim's events.
pub const CLAIM_STREAM: &str = "claim_events";

/// Errors that can occur during claim operations.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claimed amount must be positive")]
    NonPositiveClaim,

    #[error("Claim already filed")]
    AlreadyFiled,

    #[error("Claim has not been filed")]
    NotFiled,

    #[error("Cannot {action} a claim in status {current}")]
    InvalidTransition {
        action: &'static str,
        current: ClaimStatus,
    },

    #[error("Assessed amount {assessed} exceeds claimed amount {claimed}")]
    AssessedExceedsClaimed { assessed: Money, claimed: Money },

    #[error("Cannot approve claim with HIGH fraud risk")]
    HighFraudRisk,
}

impl From<ClaimError> for DomainError {
    fn from(e: ClaimError) -> Self {
        match e {
            ClaimError::NonPositiveClaim => DomainError::Validation(e.to_string()),
            _ => DomainError::BusinessRule(e.to_string()),
        }
    }
}
