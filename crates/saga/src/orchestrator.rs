//! Saga orchestrator: runs steps in order, compensates in reverse on failure.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::context::{SAGA_ID_KEY, SagaContext};
use crate::error::{Result, SagaError};
use crate::log::{SagaLog, StepLog};
use crate::repository::SagaLogRepository;
use crate::state::{SagaStatus, StepStatus};
use crate::step::SagaStep;

/// Executes sagas and records every transition in a [`SagaLogRepository`].
///
/// The orchestrator keeps no per-saga state of its own, so one instance can
/// run any number of sagas concurrently. Step failures end in a COMPENSATED or
/// FAILED log; only repository errors are returned as `Err`.
#[derive(Clone)]
pub struct SagaOrchestrator {
    repository: Arc<dyn SagaLogRepository>,
}

impl SagaOrchestrator {
    pub fn new(repository: Arc<dyn SagaLogRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn SagaLogRepository> {
        &self.repository
    }

    /// Runs `steps` in order and returns the final saga log.
    #[tracing::instrument(skip(self, steps, context), fields(saga_id = tracing::field::Empty))]
    pub async fn execute(
        &self,
        saga_type: &str,
        steps: &[Box<dyn SagaStep>],
        mut context: SagaContext,
    ) -> Result<SagaLog> {
        metrics::counter!("saga_executions_total").increment(1);
        let started = Instant::now();

        let saga_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("saga_id", saga_id.as_str());
        context.put(SAGA_ID_KEY, &saga_id)?;

        let mut log = SagaLog::start(
            saga_id.as_str(),
            saga_type,
            steps.iter().map(|s| s.name().to_string()),
            context.clone(),
        );
        self.repository.save(&log).await?;
        self.repository
            .update_status(&saga_id, SagaStatus::Running)
            .await?;
        tracing::info!(saga_type, steps = steps.len(), "saga started");

        let mut last_succeeded: Option<usize> = None;
        for (index, step) in steps.iter().enumerate() {
            match step.execute(&mut context).await {
                Ok(()) => {
                    let entry = &mut log.steps[index];
                    entry.status = StepStatus::Succeeded;
                    entry.executed_at = Some(Utc::now());
                    self.repository.update_step(&saga_id, index, entry).await?;
                    self.repository.update_context(&saga_id, &context).await?;
                    tracing::debug!(step = step.name(), index, "saga step succeeded");
                    last_succeeded = Some(index);
                }
                Err(e) => {
                    let reason = e.to_string();
                    let entry = &mut log.steps[index];
                    entry.status = StepStatus::Failed;
                    entry.executed_at = Some(Utc::now());
                    entry.error_message = Some(reason.clone());
                    self.repository.update_step(&saga_id, index, entry).await?;
                    self.repository
                        .update_failure_reason(&saga_id, &reason)
                        .await?;
                    tracing::warn!(step = step.name(), index, error = %reason, "saga step failed, compensating");

                    let status = self
                        .compensate(&saga_id, steps, &mut log.steps, last_succeeded, &context)
                        .await?;
                    match status {
                        SagaStatus::Compensated => {
                            metrics::counter!("saga_compensated").increment(1)
                        }
                        _ => metrics::counter!("saga_failed").increment(1),
                    }
                    metrics::histogram!("saga_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return self.load(&saga_id).await;
                }
            }
        }

        self.repository
            .update_status(&saga_id, SagaStatus::Completed)
            .await?;
        metrics::counter!("saga_completed").increment(1);
        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(saga_type, "saga completed");

        self.load(&saga_id).await
    }

    /// Undoes steps `last_succeeded..=0`. Every compensation is attempted,
    /// even if recording an earlier one fails; any compensation failure makes
    /// the outcome FAILED instead of COMPENSATED.
    async fn compensate(
        &self,
        saga_id: &str,
        steps: &[Box<dyn SagaStep>],
        step_logs: &mut [StepLog],
        last_succeeded: Option<usize>,
        context: &SagaContext,
    ) -> Result<SagaStatus> {
        self.repository
            .update_status(saga_id, SagaStatus::Compensating)
            .await?;

        let mut all_compensated = true;
        if let Some(last) = last_succeeded {
            for index in (0..=last).rev() {
                let step = &steps[index];
                let entry = &mut step_logs[index];
                match step.compensate(context).await {
                    Ok(()) => {
                        entry.status = StepStatus::Compensated;
                        entry.compensated_at = Some(Utc::now());
                        tracing::warn!(step = step.name(), index, "saga step compensated");
                    }
                    Err(e) => {
                        all_compensated = false;
                        entry.error_message = Some(format!("Compensation failed: {e}"));
                        tracing::error!(step = step.name(), index, error = %e, "saga compensation failed");
                    }
                }
                // A lost log write must not stop the remaining compensations.
                if let Err(e) = self.repository.update_step(saga_id, index, entry).await {
                    tracing::error!(step = step.name(), index, error = %e, "failed to record compensation");
                }
            }
        }

        let status = if all_compensated {
            SagaStatus::Compensated
        } else {
            SagaStatus::Failed
        };
        self.repository.update_status(saga_id, status).await?;
        tracing::info!(%status, "saga compensation finished");
        Ok(status)
    }

    pub async fn load(&self, saga_id: &str) -> Result<SagaLog> {
        self.repository
            .find_by_id(saga_id)
            .await?
            .ok_or_else(|| SagaError::NotFound(saga_id.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::test_steps::RecordingStep;
    use super::*;
    use crate::repository::InMemorySagaLogRepository;

    fn orchestrator() -> (SagaOrchestrator, InMemorySagaLogRepository) {
        let repo = InMemorySagaLogRepository::new();
        (SagaOrchestrator::new(Arc::new(repo.clone())), repo)
    }

    fn journal() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let (orchestrator, repo) = orchestrator();
        let calls = journal();
        let steps = vec![RecordingStep::ok("A", &calls), RecordingStep::ok("B", &calls)];

        let log = orchestrator
            .execute("TEST", &steps, SagaContext::new())
            .await
            .unwrap();

        assert_eq!(log.status, SagaStatus::Completed);
        assert_eq!(
            log.step_statuses(),
            vec![StepStatus::Succeeded, StepStatus::Succeeded]
        );
        assert!(log.completed_at.is_some());
        assert!(log.failure_reason.is_none());
        assert_eq!(log.current_step_index(), 2);
        assert_eq!(log.context.saga_id().unwrap(), log.saga_id);
        assert_eq!(log.context.get::<bool>("B").unwrap(), Some(true));
        assert_eq!(*calls.lock().unwrap(), vec!["exec:A", "exec:B"]);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn failure_compensates_in_reverse_order() {
        let (orchestrator, _) = orchestrator();
        let calls = journal();
        let steps = vec![
            RecordingStep::ok("A", &calls),
            RecordingStep::ok("B", &calls),
            RecordingStep::failing("C", &calls),
        ];

        let log = orchestrator
            .execute("TEST", &steps, SagaContext::new())
            .await
            .unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(
            log.step_statuses(),
            vec![
                StepStatus::Compensated,
                StepStatus::Compensated,
                StepStatus::Failed
            ]
        );
        assert_eq!(log.failure_reason.as_deref(), Some("C failed"));
        assert_eq!(log.steps[2].error_message.as_deref(), Some("C failed"));
        assert!(log.steps[0].compensated_at.is_some());
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["exec:A", "exec:B", "exec:C", "comp:B", "comp:A"]
        );
        assert!(log.completed_at.is_some());
    }

    #[tokio::test]
    async fn first_step_failure_compensates_nothing() {
        let (orchestrator, _) = orchestrator();
        let calls = journal();
        let steps = vec![
            RecordingStep::failing("A", &calls),
            RecordingStep::ok("B", &calls),
        ];

        let log = orchestrator
            .execute("TEST", &steps, SagaContext::new())
            .await
            .unwrap();

        assert_eq!(log.status, SagaStatus::Compensated);
        assert_eq!(
            log.step_statuses(),
            vec![StepStatus::Failed, StepStatus::Pending]
        );
        assert_eq!(*calls.lock().unwrap(), vec!["exec:A"]);
    }

    #[tokio::test]
    async fn failed_compensation_ends_failed_and_continues() {
        let (orchestrator, _) = orchestrator();
        let calls = journal();
        let steps = vec![
            RecordingStep::ok("A", &calls),
            RecordingStep::stuck("B", &calls),
            RecordingStep::failing("C", &calls),
        ];

        let log = orchestrator
            .execute("TEST", &steps, SagaContext::new())
            .await
            .unwrap();

        assert_eq!(log.status, SagaStatus::Failed);
        assert_eq!(
            log.step_statuses(),
            vec![
                StepStatus::Compensated,
                StepStatus::Succeeded,
                StepStatus::Failed
            ]
        );
        assert_eq!(
            log.steps[1].error_message.as_deref(),
            Some("Compensation failed: B cannot be undone")
        );
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["exec:A", "exec:B", "exec:C", "comp:B", "comp:A"]
        );
    }

    /// Fails every write that records a compensated step.
    struct LossyCompensationLog {
        inner: InMemorySagaLogRepository,
    }

    #[async_trait::async_trait]
    impl SagaLogRepository for LossyCompensationLog {
        async fn save(&self, log: &SagaLog) -> Result<()> {
            self.inner.save(log).await
        }

        async fn find_by_id(&self, saga_id: &str) -> Result<Option<SagaLog>> {
            self.inner.find_by_id(saga_id).await
        }

        async fn update_status(&self, saga_id: &str, status: SagaStatus) -> Result<()> {
            self.inner.update_status(saga_id, status).await
        }

        async fn update_step(&self, saga_id: &str, index: usize, step: &StepLog) -> Result<()> {
            if step.status == StepStatus::Compensated {
                return Err(SagaError::Repository(sqlx::Error::PoolTimedOut));
            }
            self.inner.update_step(saga_id, index, step).await
        }

        async fn update_context(&self, saga_id: &str, context: &SagaContext) -> Result<()> {
            self.inner.update_context(saga_id, context).await
        }

        async fn update_failure_reason(&self, saga_id: &str, reason: &str) -> Result<()> {
            self.inner.update_failure_reason(saga_id, reason).await
        }
    }

    #[tokio::test]
    async fn log_write_failure_does_not_stop_compensation() {
        let orchestrator = SagaOrchestrator::new(Arc::new(LossyCompensationLog {
            inner: InMemorySagaLogRepository::new(),
        }));
        let calls = journal();
        let steps = vec![
            RecordingStep::ok("A", &calls),
            RecordingStep::ok("B", &calls),
            RecordingStep::failing("C", &calls),
        ];

        let log = orchestrator
            .execute("TEST", &steps, SagaContext::new())
            .await
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["exec:A", "exec:B", "exec:C", "comp:B", "comp:A"]
        );
        assert_eq!(log.status, SagaStatus::Compensated);
        assert!(log.completed_at.is_some());
    }

    #[tokio::test]
    async fn concurrent_sagas_get_separate_logs() {
        let (orchestrator, repo) = orchestrator();
        let calls = journal();
        let steps = vec![RecordingStep::ok("A", &calls)];

        let (a, b) = tokio::join!(
            orchestrator.execute("TEST", &steps, SagaContext::new()),
            orchestrator.execute("TEST", &steps, SagaContext::new()),
        );

        assert_ne!(a.unwrap().saga_id, b.unwrap().saga_id);
        assert_eq!(repo.len().await, 2);
    }
}
