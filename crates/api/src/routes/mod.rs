//! HTTP route handlers.

pub mod accounts;
pub mod claims;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod policies;
pub mod projections;
pub mod sagas;

use common::AggregateId;

use crate::error::ApiError;

/// Uses the supplied id, or generates one when the client omitted it.
pub(crate) fn id_or_generate(id: Option<String>) -> Result<AggregateId, ApiError> {
    match id {
        Some(id) if id.trim().is_empty() => Err(ApiError::BadRequest("id must not be blank".into())),
        Some(id) => Ok(AggregateId::new(id)),
        None => Ok(AggregateId::generate()),
    }
}
