//! Claim settlement saga: fraud check, approval, policy update, payment.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{ClaimService, FraudRisk, Money, PolicyService};
use event_store::{EventStore, SnapshotStore};
use projections::{ClaimDashboardView, ClaimStatisticsView};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::log::SagaLog;
use crate::orchestrator::SagaOrchestrator;
use crate::step::SagaStep;

pub const CLAIM_SETTLEMENT: &str = "CLAIM_SETTLEMENT";

pub const FRAUD_CHECK: &str = "FRAUD_CHECK";
pub const APPROVE_CLAIM: &str = "APPROVE_CLAIM";
pub const UPDATE_POLICY: &str = "UPDATE_POLICY";
pub const NOTIFY_SETTLEMENT: &str = "NOTIFY_SETTLEMENT";

const CLAIM_KEY: &str = "claimId";
const POLICY_KEY: &str = "policyId";
const CATEGORY_KEY: &str = "category";
const APPROVED_AMOUNT_KEY: &str = "approvedAmount";

/// A category with more filed claims than this is checked for approval rate.
pub const SUSPICIOUS_FILED_COUNT: u64 = 5;

/// Approval rate below which a busy category is treated as suspicious.
pub const SUSPICIOUS_APPROVAL_RATE: f64 = 0.3;

/// Customer-facing record of a settled claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimStatusNotification {
    pub id: Uuid,
    pub claim_id: AggregateId,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only notification outbox.
#[derive(Clone, Default)]
pub struct NotificationStore {
    notifications: Arc<RwLock<Vec<ClaimStatusNotification>>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, notification: ClaimStatusNotification) {
        self.notifications.write().await.push(notification);
    }

    pub async fn for_claim(&self, claim_id: &AggregateId) -> Vec<ClaimStatusNotification> {
        self.notifications
            .read()
            .await
            .iter()
            .filter(|n| &n.claim_id == claim_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.notifications.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifications.read().await.is_empty()
    }
}

/// Rejects HIGH-risk claims and categories whose history looks suspicious.
/// Read-only, so nothing to compensate.
pub struct FraudCheck {
    dashboard: ClaimDashboardView,
    statistics: ClaimStatisticsView,
}

#[async_trait]
impl SagaStep for FraudCheck {
    fn name(&self) -> &str {
        FRAUD_CHECK
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let claim_id = AggregateId::new(context.require::<String>(CLAIM_KEY)?);
        let category: String = context.require(CATEGORY_KEY)?;

        let summary = self
            .dashboard
            .get(&claim_id)
            .await
            .ok_or_else(|| SagaError::Step(format!("Claim dashboard not found: {claim_id}")))?;

        if summary.fraud_risk == Some(FraudRisk::High) {
            return Err(SagaError::Step(
                "Fraud check failed: claim has HIGH fraud risk".to_string(),
            ));
        }

        if let Some(stats) = self.statistics.get(&category).await
            && stats.filed_count > SUSPICIOUS_FILED_COUNT
        {
            let rate = stats.approval_rate();
            if rate < SUSPICIOUS_APPROVAL_RATE {
                return Err(SagaError::Step(format!(
                    "Fraud check failed: category {category} has suspicious pattern \
                     (filedCount={}, approvalRate={rate:.2})",
                    stats.filed_count
                )));
            }
        }

        context.put("fraudCheckPassed", true)
    }

    async fn compensate(&self, _context: &SagaContext) -> Result<()> {
        Ok(())
    }
}

/// Approves the claim for the requested amount.
pub struct ApproveClaim<S: EventStore + SnapshotStore> {
    claims: Arc<ClaimService<S>>,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for ApproveClaim<S> {
    fn name(&self) -> &str {
        APPROVE_CLAIM
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let claim_id = AggregateId::new(context.require::<String>(CLAIM_KEY)?);
        let amount: Money = context.require(APPROVED_AMOUNT_KEY)?;
        self.claims.approve(&claim_id, amount).await?;
        Ok(())
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        let claim_id = AggregateId::new(context.require::<String>(CLAIM_KEY)?);
        self.claims
            .reject(&claim_id, "Settlement saga compensation")
            .await?;
        Ok(())
    }
}

/// Adds the payout to the policy's running totals.
pub struct UpdatePolicy {
    policies: PolicyService,
}

#[async_trait]
impl SagaStep for UpdatePolicy {
    fn name(&self) -> &str {
        UPDATE_POLICY
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let policy_id: String = context.require(POLICY_KEY)?;
        let amount: Money = context.require(APPROVED_AMOUNT_KEY)?;
        let policy = self.policies.record_claim_paid(&policy_id, amount).await?;
        context.put("policyType", policy.policy_type())
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        // Only reverse what execute actually recorded.
        if !context.contains("policyType") {
            return Ok(());
        }
        let policy_id: String = context.require(POLICY_KEY)?;
        let amount: Money = context.require(APPROVED_AMOUNT_KEY)?;
        self.policies.reverse_claim_paid(&policy_id, amount).await?;
        Ok(())
    }
}

/// Pays the claim and records a notification for the claimant.
pub struct NotifySettlement<S: EventStore + SnapshotStore> {
    claims: Arc<ClaimService<S>>,
    notifications: NotificationStore,
}

#[async_trait]
impl<S: EventStore + SnapshotStore + 'static> SagaStep for NotifySettlement<S> {
    fn name(&self) -> &str {
        NOTIFY_SETTLEMENT
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        let claim_id = AggregateId::new(context.require::<String>(CLAIM_KEY)?);
        let amount: Money = context.require(APPROVED_AMOUNT_KEY)?;
        let reference = format!("SAGA-{}", context.saga_id()?);

        self.claims.pay(&claim_id, amount, &reference).await?;
        self.notifications
            .push(ClaimStatusNotification {
                id: Uuid::new_v4(),
                claim_id,
                status: "PAID".to_string(),
                message: format!("Claim settled: {amount} paid"),
                created_at: Utc::now(),
            })
            .await;
        Ok(())
    }

    // Last step: it never needs to be undone by a later failure.
    async fn compensate(&self, _context: &SagaContext) -> Result<()> {
        Ok(())
    }
}

/// Runs `FRAUD_CHECK, APPROVE_CLAIM, UPDATE_POLICY, NOTIFY_SETTLEMENT`.
pub struct SettlementSaga<S: EventStore + SnapshotStore> {
    orchestrator: SagaOrchestrator,
    claims: Arc<ClaimService<S>>,
    policies: PolicyService,
    dashboard: ClaimDashboardView,
    statistics: ClaimStatisticsView,
    notifications: NotificationStore,
}

impl<S: EventStore + SnapshotStore + 'static> SettlementSaga<S> {
    pub fn new(
        orchestrator: SagaOrchestrator,
        claims: Arc<ClaimService<S>>,
        policies: PolicyService,
        dashboard: ClaimDashboardView,
        statistics: ClaimStatisticsView,
    ) -> Self {
        Self {
            orchestrator,
            claims,
            policies,
            dashboard,
            statistics,
            notifications: NotificationStore::new(),
        }
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    fn steps(&self) -> Vec<Box<dyn SagaStep>> {
        vec![
            Box::new(FraudCheck {
                dashboard: self.dashboard.clone(),
                statistics: self.statistics.clone(),
            }),
            Box::new(ApproveClaim {
                claims: self.claims.clone(),
            }),
            Box::new(UpdatePolicy {
                policies: self.policies.clone(),
            }),
            Box::new(NotifySettlement {
                claims: self.claims.clone(),
                notifications: self.notifications.clone(),
            }),
        ]
    }

    #[tracing::instrument(skip(self), fields(%claim_id, %approved_amount))]
    pub async fn settle(
        &self,
        claim_id: &AggregateId,
        policy_id: &str,
        category: &str,
        approved_amount: Money,
    ) -> Result<SagaLog> {
        let context = SagaContext::new()
            .with(CLAIM_KEY, claim_id.as_str())?
            .with(POLICY_KEY, policy_id)?
            .with(CATEGORY_KEY, category)?
            .with(APPROVED_AMOUNT_KEY, approved_amount)?;

        self.orchestrator
            .execute(CLAIM_SETTLEMENT, &self.steps(), context)
            .await
    }
}
