use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::PolicyError;

/// Stored form of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub id: String,
    pub policy_type: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoPolicy {
    pub policy_number: String,
    pub holder_name: String,
    pub base_premium: Money,
    pub coverage_amount: Money,
    #[serde(default)]
    pub total_claims_paid: Money,
    pub vehicle_type: String,
    #[serde(default)]
    pub accident_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPolicy {
    pub policy_number: String,
    pub holder_name: String,
    pub base_premium: Money,
    pub coverage_amount: Money,
    #[serde(default)]
    pub total_claims_paid: Money,
    pub plan_tier: String,
    #[serde(default)]
    pub claims_this_year: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifePolicy {
    pub policy_number: String,
    pub holder_name: String,
    pub base_premium: Money,
    pub sum_assured: Money,
    #[serde(default)]
    pub total_claims_paid: Money,
    pub insured_age: u32,
    pub term_years: u32,
}

/// A decoded policy of any registered type.
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    Auto(AutoPolicy),
    Health(HealthPolicy),
    Life(LifePolicy),
}

impl Policy {
    /// Discriminant stored alongside the body.
    pub fn policy_type(&self) -> &'static str {
        match self {
            Policy::Auto(_) => "AUTO",
            Policy::Health(_) => "HEALTH",
            Policy::Life(_) => "LIFE",
        }
    }

    pub fn holder_name(&self) -> &str {
        match self {
            Policy::Auto(p) => &p.holder_name,
            Policy::Health(p) => &p.holder_name,
            Policy::Life(p) => &p.holder_name,
        }
    }

    /// Maximum total the policy pays out.
    pub fn coverage_limit(&self) -> Money {
        match self {
            Policy::Auto(p) => p.coverage_amount,
            Policy::Health(p) => p.coverage_amount,
            Policy::Life(p) => p.sum_assured,
        }
    }

    pub fn total_claims_paid(&self) -> Money {
        match self {
            Policy::Auto(p) => p.total_claims_paid,
            Policy::Health(p) => p.total_claims_paid,
            Policy::Life(p) => p.total_claims_paid,
        }
    }

    /// Adds a paid claim to the running total and bumps the type-specific
    /// counter (accidents for auto, claims this year for health).
    pub fn record_claim_paid(&mut self, amount: Money) -> Result<(), PolicyError> {
        if !amount.is_positive() {
            return Err(PolicyError::NonPositivePayment);
        }
        let remaining = self.coverage_limit() - self.total_claims_paid();
        if amount > remaining {
            return Err(PolicyError::CoverageExceeded { amount, remaining });
        }

        match self {
            Policy::Auto(p) => {
                p.total_claims_paid += amount;
                p.accident_count += 1;
            }
            Policy::Health(p) => {
                p.total_claims_paid += amount;
                p.claims_this_year += 1;
            }
            Policy::Life(p) => p.total_claims_paid += amount,
        }
        Ok(())
    }

    /// Undoes [`record_claim_paid`](Self::record_claim_paid).
    pub fn reverse_claim_paid(&mut self, amount: Money) {
        match self {
            Policy::Auto(p) => {
                p.total_claims_paid -= amount;
                p.accident_count = p.accident_count.saturating_sub(1);
            }
            Policy::Health(p) => {
                p.total_claims_paid -= amount;
                p.claims_this_year = p.claims_this_year.saturating_sub(1);
            }
            Policy::Life(p) => p.total_claims_paid -= amount,
        }
    }

    /// Encodes the policy for storage.
    pub fn to_document(&self, id: impl Into<String>) -> Result<PolicyDocument, PolicyError> {
        let body = match self {
            Policy::Auto(p) => serde_json::to_value(p)?,
            Policy::Health(p) => serde_json::to_value(p)?,
            Policy::Life(p) => serde_json::to_value(p)?,
        };
        Ok(PolicyDocument {
            id: id.into(),
            policy_type: self.policy_type().to_string(),
            body,
        })
    }
}
