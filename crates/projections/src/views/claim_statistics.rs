//! Per-category claim statistics, used by the fraud check.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Aggregate, ClaimEvent, ClaimProcess, Money, Projection};
use event_store::{EventEnvelope, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStatistics {
    pub category: String,
    pub filed_count: u64,
    pub approved_count: u64,
    pub rejected_count: u64,
    pub paid_count: u64,
    pub total_claimed: Money,
    pub total_approved: Money,
    pub total_paid: Money,
}

impl CategoryStatistics {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }

    /// Approved over filed, or zero when nothing was filed.
    pub fn approval_rate(&self) -> f64 {
        if self.filed_count == 0 {
            return 0.0;
        }
        self.approved_count as f64 / self.filed_count as f64
    }
}

#[derive(Default)]
struct State {
    categories: HashMap<String, CategoryStatistics>,
    // Later claim events do not carry the category.
    claims: HashMap<AggregateId, (String, Version)>,
}

#[derive(Clone, Default)]
pub struct ClaimStatisticsView {
    state: Arc<RwLock<State>>,
}

impl ClaimStatisticsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, category: &str) -> Option<CategoryStatistics> {
        self.state.read().await.categories.get(category).cloned()
    }

    /// All categories, sorted by name.
    pub async fn all(&self) -> Vec<CategoryStatistics> {
        let mut all: Vec<CategoryStatistics> =
            self.state.read().await.categories.values().cloned().collect();
        all.sort_by(|a, b| a.category.cmp(&b.category));
        all
    }

    /// Overwrites the counters of one category.
    ///
    /// Used to seed history that predates the event log.
    pub async fn seed(&self, stats: CategoryStatistics) {
        self.state
            .write()
            .await
            .categories
            .insert(stats.category.clone(), stats);
    }
}

#[async_trait]
impl Projection for ClaimStatisticsView {
    fn name(&self) -> &'static str {
        "ClaimStatisticsView"
    }

    async fn project(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != ClaimProcess::aggregate_type() {
            return Ok(());
        }

        let claim_event: ClaimEvent = serde_json::from_value(event.payload.clone())?;
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let ClaimEvent::ClaimFiled {
            category,
            claimed_amount,
            ..
        } = &claim_event
        {
            if state.claims.contains_key(&event.aggregate_id) {
                return Ok(());
            }
            state
                .claims
                .insert(event.aggregate_id.clone(), (category.clone(), event.version));
            let stats = state
                .categories
                .entry(category.clone())
                .or_insert_with(|| CategoryStatistics::new(category));
            stats.filed_count += 1;
            stats.total_claimed = stats.total_claimed.saturating_add(*claimed_amount);
            return Ok(());
        }

        let Some((category, projected)) = state.claims.get_mut(&event.aggregate_id) else {
            tracing::warn!(claim_id = %event.aggregate_id, "event for unknown claim");
            return Ok(());
        };
        if event.version <= *projected {
            return Ok(());
        }
        *projected = event.version;

        let stats = state
            .categories
            .entry(category.clone())
            .or_insert_with(|| CategoryStatistics::new(category));

        match claim_event {
            ClaimEvent::ClaimApproved { amount } => {
                stats.approved_count += 1;
                stats.total_approved = stats.total_approved.saturating_add(amount);
            }
            ClaimEvent::ClaimRejected { .. } => stats.rejected_count += 1,
            ClaimEvent::ClaimPaid { amount, .. } => {
                stats.paid_count += 1;
                stats.total_paid = stats.total_paid.saturating_add(amount);
            }
            ClaimEvent::ClaimFiled { .. }
            | ClaimEvent::ClaimInvestigated { .. }
            | ClaimEvent::ClaimAssessed { .. } => {}
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.categories.clear();
        state.claims.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Event;

    fn envelope(id: &str, version: i64, event: ClaimEvent) -> EventEnvelope {
        Event::new(AggregateId::new(id), Version::new(version), event)
            .to_envelope("ClaimProcess")
            .unwrap()
    }

    fn filed(category: &str, cents: i64) -> ClaimEvent {
        ClaimEvent::ClaimFiled {
            policy_id: "POL-1".to_string(),
            claimant_name: "Chen".to_string(),
            category: category.to_string(),
            claimed_amount: Money::from_cents(cents),
            description: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn counts_per_category() {
        let view = ClaimStatisticsView::new();
        view.project(&envelope("C-1", 1, filed("AUTO", 1_000)))
            .await
            .unwrap();
        view.project(&envelope("C-2", 1, filed("AUTO", 2_000)))
            .await
            .unwrap();
        view.project(&envelope("C-3", 1, filed("HEALTH", 500)))
            .await
            .unwrap();
        view.project(&envelope(
            "C-1",
            2,
            ClaimEvent::ClaimApproved {
                amount: Money::from_cents(800),
            },
        ))
        .await
        .unwrap();
        view.project(&envelope(
            "C-2",
            2,
            ClaimEvent::ClaimRejected {
                reason: "no".to_string(),
            },
        ))
        .await
        .unwrap();

        let auto = view.get("AUTO").await.unwrap();
        assert_eq!(auto.filed_count, 2);
        assert_eq!(auto.approved_count, 1);
        assert_eq!(auto.rejected_count, 1);
        assert_eq!(auto.total_claimed, Money::from_cents(3_000));
        assert_eq!(auto.total_approved, Money::from_cents(800));
        assert!((auto.approval_rate() - 0.5).abs() < f64::EPSILON);

        let names: Vec<String> = view.all().await.into_iter().map(|s| s.category).collect();
        assert_eq!(names, vec!["AUTO", "HEALTH"]);
    }

    #[tokio::test]
    async fn empty_category_has_zero_rate() {
        assert_eq!(CategoryStatistics::new("LIFE").approval_rate(), 0.0);
    }

    #[tokio::test]
    async fn seeded_counters_are_extended_by_events() {
        let view = ClaimStatisticsView::new();
        view.seed(CategoryStatistics {
            category: "HEALTH".to_string(),
            filed_count: 6,
            approved_count: 1,
            ..CategoryStatistics::default()
        })
        .await;
        view.project(&envelope("C-9", 1, filed("HEALTH", 100)))
            .await
            .unwrap();

        assert_eq!(view.get("HEALTH").await.unwrap().filed_count, 7);
    }
}
