//! Saga log persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::context::SagaContext;
use crate::error::{Result, SagaError};
use crate::log::{SagaLog, StepLog};
use crate::state::SagaStatus;

/// Stores one [`SagaLog`] per saga id.
///
/// Updates rewrite a single log in place; there is no cross-log transaction.
#[async_trait]
pub trait SagaLogRepository: Send + Sync {
    /// Inserts or replaces the whole log.
    async fn save(&self, log: &SagaLog) -> Result<()>;

    async fn find_by_id(&self, saga_id: &str) -> Result<Option<SagaLog>>;

    /// Writes a new status; terminal statuses also stamp `completed_at`.
    async fn update_status(&self, saga_id: &str, status: SagaStatus) -> Result<()>;

    /// Replaces the step at `index`.
    async fn update_step(&self, saga_id: &str, index: usize, step: &StepLog) -> Result<()>;

    async fn update_context(&self, saga_id: &str, context: &SagaContext) -> Result<()>;

    async fn update_failure_reason(&self, saga_id: &str, reason: &str) -> Result<()>;
}

/// In-memory saga log repository for tests and the single-process binary.
#[derive(Clone, Default)]
pub struct InMemorySagaLogRepository {
    logs: Arc<RwLock<HashMap<String, SagaLog>>>,
}

impl InMemorySagaLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.logs.read().await.is_empty()
    }

    async fn modify(&self, saga_id: &str, f: impl FnOnce(&mut SagaLog)) -> Result<()> {
        let mut logs = self.logs.write().await;
        let log = logs
            .get_mut(saga_id)
            .ok_or_else(|| SagaError::NotFound(saga_id.to_string()))?;
        f(log);
        Ok(())
    }
}

#[async_trait]
impl SagaLogRepository for InMemorySagaLogRepository {
    async fn save(&self, log: &SagaLog) -> Result<()> {
        self.logs
            .write()
            .await
            .insert(log.saga_id.clone(), log.clone());
        Ok(())
    }

    async fn find_by_id(&self, saga_id: &str) -> Result<Option<SagaLog>> {
        Ok(self.logs.read().await.get(saga_id).cloned())
    }

    async fn update_status(&self, saga_id: &str, status: SagaStatus) -> Result<()> {
        self.modify(saga_id, |log| {
            log.status = status;
            if status.is_terminal() {
                log.completed_at = Some(Utc::now());
            }
        })
        .await
    }

    async fn update_step(&self, saga_id: &str, index: usize, step: &StepLog) -> Result<()> {
        let mut logs = self.logs.write().await;
        let log = logs
            .get_mut(saga_id)
            .ok_or_else(|| SagaError::NotFound(saga_id.to_string()))?;
        let slot = log.steps.get_mut(index).ok_or_else(|| {
            SagaError::Step(format!("Saga {saga_id} has no step at index {index}"))
        })?;
        *slot = step.clone();
        Ok(())
    }

    async fn update_context(&self, saga_id: &str, context: &SagaContext) -> Result<()> {
        self.modify(saga_id, |log| log.context = context.clone())
            .await
    }

    async fn update_failure_reason(&self, saga_id: &str, reason: &str) -> Result<()> {
        self.modify(saga_id, |log| log.failure_reason = Some(reason.to_string()))
            .await
    }
}
