//! Claim aggregate implementation.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{CLAIM_STREAM, ClaimError, ClaimEvent, ClaimStatus, FraudRisk};

/// Insurance claim state, from filing to payment or rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimProcess {
    filed: bool,
    policy_id: String,
    claimant_name: String,
    category: String,
    claimed_amount: Money,
    assessed_amount: Option<Money>,
    approved_amount: Option<Money>,
    paid_amount: Option<Money>,
    fraud_risk: Option<FraudRisk>,
    status: ClaimStatus,
}

impl Aggregate for ClaimProcess {
    type Event = ClaimEvent;
    type Error = ClaimError;

    fn aggregate_type() -> &'static str {
        "ClaimProcess"
    }

    fn stream() -> &'static str {
        CLAIM_STREAM
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClaimEvent::ClaimFiled {
                policy_id,
                claimant_name,
                category,
                claimed_amount,
                ..
            } => {
                self.filed = true;
                self.policy_id = policy_id.clone();
                self.claimant_name = claimant_name.clone();
                self.category = category.clone();
                self.claimed_amount = *claimed_amount;
                self.status = ClaimStatus::Filed;
            }
            ClaimEvent::ClaimInvestigated { fraud_risk, .. } => {
                self.fraud_risk = Some(*fraud_risk);
                self.status = ClaimStatus::UnderInvestigation;
            }
            ClaimEvent::ClaimAssessed { amount, .. } => {
                self.assessed_amount = Some(*amount);
                self.status = ClaimStatus::Assessed;
            }
            ClaimEvent::ClaimApproved { amount } => {
                self.approved_amount = Some(*amount);
                self.status = ClaimStatus::Approved;
            }
            ClaimEvent::ClaimRejected { .. } => {
                self.status = ClaimStatus::Rejected;
            }
            ClaimEvent::ClaimPaid { amount, .. } => {
                self.paid_amount = Some(*amount);
                self.status = ClaimStatus::Paid;
            }
        }
    }
}

// Query methods
impl ClaimProcess {
    pub fn policy_id(&self) -> &str {
        &self.policy_id
    }

    pub fn claimant_name(&self) -> &str {
        &self.claimant_name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn claimed_amount(&self) -> Money {
        self.claimed_amount
    }

    pub fn assessed_amount(&self) -> Option<Money> {
        self.assessed_amount
    }

    pub fn approved_amount(&self) -> Option<Money> {
        self.approved_amount
    }

    pub fn paid_amount(&self) -> Option<Money> {
        self.paid_amount
    }

    pub fn fraud_risk(&self) -> Option<FraudRisk> {
        self.fraud_risk
    }

    pub fn status(&self) -> ClaimStatus {
        self.status
    }
}

// Command methods (return events)
impl ClaimProcess {
    /// Files a new claim. Factory command.
    pub fn file(
        &self,
        policy_id: impl Into<String>,
        claimant_name: impl Into<String>,
        category: impl Into<String>,
        claimed_amount: Money,
        description: impl Into<String>,
    ) -> Result<Vec<ClaimEvent>, ClaimError> {
        if self.filed {
            return Err(ClaimError::AlreadyFiled);
        }
        if !claimed_amount.is_positive() {
            return Err(ClaimError::NonPositiveClaim);
        }

        Ok(vec![ClaimEvent::ClaimFiled {
            policy_id: policy_id.into(),
            claimant_name: claimant_name.into(),
            category: category.into(),
            claimed_amount,
            description: description.into(),
        }])
    }

    pub fn investigate(
        &self,
        investigator: impl Into<String>,
        findings: impl Into<String>,
        fraud_risk: FraudRisk,
    ) -> Result<Vec<ClaimEvent>, ClaimError> {
        self.ensure(self.status.can_investigate(), "investigate")?;

        Ok(vec![ClaimEvent::ClaimInvestigated {
            investigator: investigator.into(),
            findings: findings.into(),
            fraud_risk,
        }])
    }

    pub fn assess(
        &self,
        amount: Money,
        notes: impl Into<String>,
    ) -> Result<Vec<ClaimEvent>, ClaimError> {
        self.ensure(self.status.can_assess(), "assess")?;
        if amount > self.claimed_amount {
            return Err(ClaimError::AssessedExceedsClaimed {
                assessed: amount,
                claimed: self.claimed_amount,
            });
        }

        Ok(vec![ClaimEvent::ClaimAssessed {
            amount,
            notes: notes.into(),
        }])
    }

    pub fn approve(&self, amount: Money) -> Result<Vec<ClaimEvent>, ClaimError> {
        self.ensure(self.status.can_approve(), "approve")?;
        if self.fraud_risk == Some(FraudRisk::High) {
            return Err(ClaimError::HighFraudRisk);
        }

        Ok(vec![ClaimEvent::ClaimApproved { amount }])
    }

    pub fn reject(&self, reason: impl Into<String>) -> Result<Vec<ClaimEvent>, ClaimError> {
        self.ensure(self.status.can_reject(), "reject")?;

        Ok(vec![ClaimEvent::ClaimRejected {
            reason: reason.into(),
        }])
    }

    pub fn pay(
        &self,
        amount: Money,
        payment_reference: impl Into<String>,
    ) -> Result<Vec<ClaimEvent>, ClaimError> {
        self.ensure(self.status.can_pay(), "pay")?;

        Ok(vec![ClaimEvent::ClaimPaid {
            amount,
            payment_reference: payment_reference.into(),
        }])
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), ClaimError> {
        if !self.filed {
            return Err(ClaimError::NotFiled);
        }
        if !allowed {
            return Err(ClaimError::InvalidTransition {
                action,
                current: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AggregateRoot;
    use common::AggregateId;
    use event_store::Version;

    fn filed(claimed: i64) -> AggregateRoot<ClaimProcess> {
        let mut root: AggregateRoot<ClaimProcess> = AggregateRoot::new(AggregateId::new("CLM-1"));
        root.execute(|c| {
            c.file(
                "POL-1",
                "Chen",
                "AUTO",
                Money::from_cents(claimed),
                "rear-ended",
            )
        })
        .unwrap();
        root
    }

    #[test]
    fn full_lifecycle_to_paid() {
        let mut root = filed(50_000);
        root.execute(|c| c.investigate("Lin", "consistent", FraudRisk::Low))
            .unwrap();
        root.execute(|c| c.assess(Money::from_cents(30_000), "bumper"))
            .unwrap();
        root.execute(|c| c.approve(Money::from_cents(30_000)))
            .unwrap();
        root.execute(|c| c.pay(Money::from_cents(30_000), "PAY-1"))
            .unwrap();

        let claim = root.state();
        assert_eq!(claim.status(), ClaimStatus::Paid);
        assert_eq!(claim.assessed_amount(), Some(Money::from_cents(30_000)));
        assert_eq!(claim.paid_amount(), Some(Money::from_cents(30_000)));
        assert_eq!(root.version(), Version::new(5));
    }

    #[test]
    fn file_rejects_non_positive_amount() {
        let root = AggregateRoot::<ClaimProcess>::new(AggregateId::new("CLM-1"));
        let err = root
            .state()
            .file("POL-1", "Chen", "AUTO", Money::zero(), "x")
            .unwrap_err();
        assert!(matches!(err, ClaimError::NonPositiveClaim));
    }

    #[test]
    fn assessment_cannot_exceed_claim() {
        let mut root = filed(10_000);
        root.execute(|c| c.investigate("Lin", "ok", FraudRisk::Low))
            .unwrap();

        let err = root
            .execute(|c| c.assess(Money::from_cents(10_001), "too much"))
            .unwrap_err();
        assert!(matches!(err, ClaimError::AssessedExceedsClaimed { .. }));
        assert_eq!(root.state().status(), ClaimStatus::UnderInvestigation);
    }

    #[test]
    fn high_fraud_risk_blocks_approval() {
        let mut root = filed(10_000);
        root.execute(|c| c.investigate("Lin", "staged", FraudRisk::High))
            .unwrap();
        root.execute(|c| c.assess(Money::from_cents(5_000), "partial"))
            .unwrap();

        let err = root
            .execute(|c| c.approve(Money::from_cents(5_000)))
            .unwrap_err();
        assert!(matches!(err, ClaimError::HighFraudRisk));
        assert_eq!(root.state().status(), ClaimStatus::Assessed);
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let root = filed(10_000);
        let claim = root.state();

        assert!(matches!(
            claim.assess(Money::from_cents(1), "early"),
            Err(ClaimError::InvalidTransition {
                action: "assess",
                current: ClaimStatus::Filed
            })
        ));
        assert!(claim.approve(Money::from_cents(1)).is_err());
        assert!(claim.pay(Money::from_cents(1), "PAY").is_err());
    }

    #[test]
    fn rejected_claim_is_terminal() {
        let mut root = filed(10_000);
        root.execute(|c| c.reject("lapsed policy")).unwrap();
        assert_eq!(root.state().status(), ClaimStatus::Rejected);
        assert!(root.state().status().is_terminal());

        assert!(root.execute(|c| c.reject("again")).is_err());
        assert!(
            root.execute(|c| c.investigate("Lin", "late", FraudRisk::Low))
                .is_err()
        );
    }

    #[test]
    fn commands_on_unfiled_claim_fail() {
        let claim = ClaimProcess::default();
        assert!(matches!(claim.reject("x"), Err(ClaimError::NotFiled)));
    }
}
