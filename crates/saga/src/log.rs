//! Durable record of one saga execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::SagaContext;
use crate::state::{SagaStatus, StepStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    pub step_name: String,
    pub status: StepStatus,
    pub executed_at: Option<DateTime<Utc>>,
    pub compensated_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl StepLog {
    pub fn pending(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Pending,
            executed_at: None,
            compensated_at: None,
            error_message: None,
        }
    }
}

/// Saga log: status, one [`StepLog`] per step in execution order, and the
/// context as it stood after the last successful step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaLog {
    pub saga_id: String,
    pub saga_type: String,
    pub status: SagaStatus,
    pub steps: Vec<StepLog>,
    pub context: SagaContext,
    pub failure_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaLog {
    /// Creates a log in STARTED with every step PENDING.
    pub fn start(
        saga_id: impl Into<String>,
        saga_type: impl Into<String>,
        step_names: impl IntoIterator<Item = impl Into<String>>,
        context: SagaContext,
    ) -> Self {
        Self {
            saga_id: saga_id.into(),
            saga_type: saga_type.into(),
            status: SagaStatus::Started,
            steps: step_names.into_iter().map(StepLog::pending).collect(),
            context,
            failure_reason: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Index of the step currently running or last reached: the first
    /// non-SUCCEEDED step, or the step count once all succeeded.
    pub fn current_step_index(&self) -> usize {
        self.steps
            .iter()
            .position(|s| s.status != StepStatus::Succeeded)
            .unwrap_or(self.steps.len())
    }

    pub fn step(&self, name: &str) -> Option<&StepLog> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    pub fn step_statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_marks_every_step_pending() {
        let log = SagaLog::start("s-1", "TEST", ["A", "B"], SagaContext::new());
        assert_eq!(log.status, SagaStatus::Started);
        assert_eq!(
            log.step_statuses(),
            vec![StepStatus::Pending, StepStatus::Pending]
        );
        assert_eq!(log.current_step_index(), 0);
        assert!(log.completed_at.is_none());
    }

    #[test]
    fn current_step_index_advances_past_succeeded_steps() {
        let mut log = SagaLog::start("s-1", "TEST", ["A", "B", "C"], SagaContext::new());
        log.steps[0].status = StepStatus::Succeeded;
        assert_eq!(log.current_step_index(), 1);
        log.steps[1].status = StepStatus::Succeeded;
        log.steps[2].status = StepStatus::Succeeded;
        assert_eq!(log.current_step_index(), 3);
    }

    #[test]
    fn serializes_statuses_in_stored_form() {
        let log = SagaLog::start("s-1", "TEST", ["A"], SagaContext::new());
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["saga_id"], "s-1");
        assert_eq!(json["status"], "STARTED");
        assert_eq!(json["steps"][0]["step_name"], "A");
        assert_eq!(json["steps"][0]["status"], "PENDING");
    }
}
