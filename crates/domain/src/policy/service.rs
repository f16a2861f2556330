use std::sync::Arc;

use crate::money::Money;

use super::{Policy, PolicyError, PolicyRegistry, PolicyStore};

/// Reads and updates policies through the registry.
#[derive(Clone)]
pub struct PolicyService {
    store: Arc<dyn PolicyStore>,
    registry: Arc<PolicyRegistry>,
}

impl PolicyService {
    pub fn new(store: Arc<dyn PolicyStore>, registry: PolicyRegistry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Stores a policy under `id`, replacing any existing one.
    #[tracing::instrument(skip(self, policy), fields(policy_type = policy.policy_type()))]
    pub async fn register_policy(&self, id: &str, policy: &Policy) -> Result<(), PolicyError> {
        if !self.registry.is_registered(policy.policy_type()) {
            return Err(PolicyError::UnknownType(policy.policy_type().to_string()));
        }
        self.store.save(policy.to_document(id)?).await;
        Ok(())
    }

    /// Stores a raw document after checking that it decodes.
    pub async fn register_document(
        &self,
        document: super::PolicyDocument,
    ) -> Result<Policy, PolicyError> {
        let policy = self.registry.decode(&document)?;
        self.store.save(document).await;
        Ok(policy)
    }

    pub async fn get(&self, id: &str) -> Result<Policy, PolicyError> {
        let document = self
            .store
            .find(id)
            .await
            .ok_or_else(|| PolicyError::NotFound(id.to_string()))?;
        self.registry.decode(&document)
    }

    /// Records a paid claim against the policy and returns the updated policy.
    #[tracing::instrument(skip(self))]
    pub async fn record_claim_paid(&self, id: &str, amount: Money) -> Result<Policy, PolicyError> {
        let mut policy = self.get(id).await?;
        policy.record_claim_paid(amount)?;
        self.store.save(policy.to_document(id)?).await;
        Ok(policy)
    }

    /// Reverses a previously recorded claim payment.
    #[tracing::instrument(skip(self))]
    pub async fn reverse_claim_paid(&self, id: &str, amount: Money) -> Result<Policy, PolicyError> {
        let mut policy = self.get(id).await?;
        policy.reverse_claim_paid(amount);
        self.store.save(policy.to_document(id)?).await;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{HealthPolicy, InMemoryPolicyStore, PolicyDocument};

    fn service() -> PolicyService {
        PolicyService::new(
            Arc::new(InMemoryPolicyStore::new()),
            PolicyRegistry::with_defaults(),
        )
    }

    fn health() -> Policy {
        Policy::Health(HealthPolicy {
            policy_number: "H-1".to_string(),
            holder_name: "Lin".to_string(),
            base_premium: Money::from_cents(800),
            coverage_amount: Money::from_cents(50_000),
            total_claims_paid: Money::zero(),
            plan_tier: "GOLD".to_string(),
            claims_this_year: 0,
        })
    }

    #[tokio::test]
    async fn record_and_reverse_round_trip_through_store() {
        let policies = service();
        policies.register_policy("POL-H", &health()).await.unwrap();

        let updated = policies
            .record_claim_paid("POL-H", Money::from_cents(10_000))
            .await
            .unwrap();
        assert!(matches!(updated, Policy::Health(ref p) if p.claims_this_year == 1));
        assert_eq!(
            policies.get("POL-H").await.unwrap().total_claims_paid(),
            Money::from_cents(10_000)
        );

        policies
            .reverse_claim_paid("POL-H", Money::from_cents(10_000))
            .await
            .unwrap();
        assert_eq!(policies.get("POL-H").await.unwrap(), health());
    }

    #[tokio::test]
    async fn missing_policy_is_not_found() {
        let err = service().get("nope").await.unwrap_err();
        assert!(matches!(err, PolicyError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_document_type_is_not_stored() {
        let store = Arc::new(InMemoryPolicyStore::new());
        let policies = PolicyService::new(store.clone(), PolicyRegistry::with_defaults());

        let err = policies
            .register_document(PolicyDocument {
                id: "POL-X".to_string(),
                policy_type: "PET".to_string(),
                body: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnknownType(_)));
        assert!(store.is_empty().await);
    }
}
