//! Claim domain events.

use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::FraudRisk;

/// Events that can occur on a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClaimEvent {
    ClaimFiled {
        policy_id: String,
        claimant_name: String,
        category: String,
        claimed_amount: Money,
        description: String,
    },

    ClaimInvestigated {
        investigator: String,
        findings: String,
        fraud_risk: FraudRisk,
    },

    ClaimAssessed {
        amount: Money,
        notes: String,
    },

    ClaimApproved {
        amount: Money,
    },

    ClaimRejected {
        reason: String,
    },

    ClaimPaid {
        amount: Money,
        payment_reference: String,
    },
}

impl DomainEvent for ClaimEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClaimEvent::ClaimFiled { .. } => "ClaimFiled",
            ClaimEvent::ClaimInvestigated { .. } => "ClaimInvestigated",
            ClaimEvent::ClaimAssessed { .. } => "ClaimAssessed",
            ClaimEvent::ClaimApproved { .. } => "ClaimApproved",
            ClaimEvent::ClaimRejected { .. } => "ClaimRejected",
            ClaimEvent::ClaimPaid { .. } => "ClaimPaid",
        }
    }
}
