//! Claim lifecycle states.

use serde::{Deserialize, Serialize};

/// The state of a claim in its lifecycle.
///
/// State transitions:
/// ```text
/// Filed ──► UnderInvestigation ──► Assessed ──► Approved ──► Paid
///   │               │                  │
///   └───────────────┴──────────────────┴──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    #[default]
    Filed,
    UnderInvestigation,
    Assessed,
    Approved,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub fn can_investigate(&self) -> bool {
        matches!(self, ClaimStatus::Filed)
    }

    pub fn can_assess(&self) -> bool {
        matches!(self, ClaimStatus::UnderInvestigation)
    }

    pub fn can_approve(&self) -> bool {
        matches!(self, ClaimStatus::Assessed)
    }

    pub fn can_reject(&self) -> bool {
        matches!(
            self,
            ClaimStatus::Filed
                | ClaimStatus::UnderInvestigation
                | ClaimStatus::Assessed
                | ClaimStatus::Approved
        )
    }

    pub fn can_pay(&self) -> bool {
        matches!(self, ClaimStatus::Approved)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Rejected | ClaimStatus::Paid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Filed => "FILED",
            ClaimStatus::UnderInvestigation => "UNDER_INVESTIGATION",
            ClaimStatus::Assessed => "ASSESSED",
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Rejected => "REJECTED",
            ClaimStatus::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Investigator's fraud assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FraudRisk {
    Low,
    Medium,
    High,
}

impl FraudRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudRisk::Low => "LOW",
            FraudRisk::Medium => "MEDIUM",
            FraudRisk::High => "HIGH",
        }
    }
}

impl std::fmt::Display for FraudRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_allowed_until_payment() {
        assert!(ClaimStatus::Filed.can_reject());
        assert!(ClaimStatus::UnderInvestigation.can_reject());
        assert!(ClaimStatus::Assessed.can_reject());
        assert!(ClaimStatus::Approved.can_reject());
        assert!(!ClaimStatus::Paid.can_reject());
    }

    #[test]
    fn serde_names_match_display() {
        for status in [
            ClaimStatus::Filed,
            ClaimStatus::UnderInvestigation,
            ClaimStatus::Assessed,
            ClaimStatus::Approved,
            ClaimStatus::Rejected,
            ClaimStatus::Paid,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::json!(status.as_str()));
        }
        assert_eq!(
            serde_json::to_value(FraudRisk::High).unwrap(),
            serde_json::json!("HIGH")
        );
    }
}
