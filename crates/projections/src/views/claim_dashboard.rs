//! Claim dashboard read model: current status, amounts and a timeline per claim.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, ClaimEvent, ClaimProcess, ClaimStatus, FraudRisk, Money, Projection};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub status: ClaimStatus,
    pub note: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimSummary {
    pub claim_id: AggregateId,
    pub policy_id: String,
    pub claimant_name: String,
    pub category: String,
    pub status: ClaimStatus,
    pub claimed_amount: Money,
    pub assessed_amount: Option<Money>,
    pub approved_amount: Option<Money>,
    pub paid_amount: Option<Money>,
    pub fraud_risk: Option<FraudRisk>,
    pub payment_reference: Option<String>,
    pub rejection_reason: Option<String>,
    pub filed_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub timeline: Vec<TimelineEntry>,
    pub projected_version: Version,
}

/// Read model view over the claim stream.
#[derive(Clone, Default)]
pub struct ClaimDashboardView {
    claims: Arc<RwLock<HashMap<AggregateId, ClaimSummary>>>,
}

impl ClaimDashboardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, claim_id: &AggregateId) -> Option<ClaimSummary> {
        self.claims.read().await.get(claim_id).cloned()
    }

    pub async fn by_status(&self, status: ClaimStatus) -> Vec<ClaimSummary> {
        let mut matching: Vec<ClaimSummary> = self
            .claims
            .read()
            .await
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
        matching
    }

    pub async fn count(&self) -> usize {
        self.claims.read().await.len()
    }
}

#[async_trait]
impl Projection for ClaimDashboardView {
    fn name(&self) -> &'static str {
        "ClaimDashboardView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != ClaimProcess::aggregate_type() {
            return Ok(());
        }

        let claim_event: ClaimEvent = serde_json::from_value(event.payload.clone())?;
        let mut claims = self.claims.write().await;

        if let ClaimEvent::ClaimFiled {
            policy_id,
            claimant_name,
            category,
            claimed_amount,
            description,
        } = claim_event
        {
            claims
                .entry(event.aggregate_id.clone())
                .or_insert_with(|| ClaimSummary {
                    claim_id: event.aggregate_id.clone(),
                    policy_id,
                    claimant_name,
                    category,
                    status: ClaimStatus::Filed,
                    claimed_amount,
                    assessed_amount: None,
                    approved_amount: None,
                    paid_amount: None,
                    fraud_risk: None,
                    payment_reference: None,
                    rejection_reason: None,
                    filed_at: event.occurred_at,
                    last_updated_at: event.occurred_at,
                    timeline: vec![TimelineEntry {
                        status: ClaimStatus::Filed,
                        note: description,
                        at: event.occurred_at,
                    }],
                    projected_version: event.version,
                });
            return Ok(());
        }

        let Some(claim) = claims.get_mut(&event.aggregate_id) else {
            tracing::warn!(
                claim_id = %event.aggregate_id,
                event_type = %event.event_type,
                "event for unknown claim"
            );
            return Ok(());
        };
        if event.version <= claim.projected_version {
            return Ok(());
        }

        let (status, note) = match claim_event {
            ClaimEvent::ClaimFiled { .. } => return Ok(()),
            ClaimEvent::ClaimInvestigated {
                investigator,
                fraud_risk,
                ..
            } => {
                claim.fraud_risk = Some(fraud_risk);
                (
                    ClaimStatus::UnderInvestigation,
                    format!("Investigated by {investigator}, fraud risk {fraud_risk}"),
                )
            }
            ClaimEvent::ClaimAssessed { amount, notes } => {
                claim.assessed_amount = Some(amount);
                (ClaimStatus::Assessed, format!("Assessed at {amount}: {notes}"))
            }
            ClaimEvent::ClaimApproved { amount } => {
                claim.approved_amount = Some(amount);
                (ClaimStatus::Approved, format!("Approved for {amount}"))
            }
            ClaimEvent::ClaimRejected { reason } => {
                claim.rejection_reason = Some(reason.clone());
                (ClaimStatus::Rejected, reason)
            }
            ClaimEvent::ClaimPaid {
                amount,
                payment_reference,
            } => {
                claim.paid_amount = Some(amount);
                let note = format!("Paid {amount} ({payment_reference})");
                claim.payment_reference = Some(payment_reference);
                (ClaimStatus::Paid, note)
            }
        };

        claim.status = status;
        claim.last_updated_at = event.occurred_at;
        claim.projected_version = event.version;
        claim.timeline.push(TimelineEntry {
            status,
            note,
            at: event.occurred_at,
        });

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.claims.write().await.clear();
        Ok(())
    }
}
