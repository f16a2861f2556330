//! Saga and step status machines.

use serde::{Deserialize, Serialize};

/// The status of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Started ──► Running ──┬──► Completed
///                       └──► Compensating ──┬──► Compensated
///                                           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Log persisted, no step run yet.
    #[default]
    Started,

    /// Steps are being executed.
    Running,

    /// All steps succeeded (terminal).
    Completed,

    /// A step failed and succeeded steps are being undone.
    Compensating,

    /// Every succeeded step was undone (terminal).
    Compensated,

    /// A compensation failed; needs manual intervention (terminal).
    Failed,
}

impl SagaStatus {
    /// Returns true if the saga can begin running.
    pub fn can_run(&self) -> bool {
        matches!(self, SagaStatus::Started)
    }

    /// Returns true if the saga can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaStatus::Running)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::Running => "RUNNING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Compensated => "COMPENSATED",
            SagaStatus::Failed => "FAILED",
        }
    }

    /// Parses the stored form produced by [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "STARTED" => SagaStatus::Started,
            "RUNNING" => SagaStatus::Running,
            "COMPLETED" => SagaStatus::Completed,
            "COMPENSATING" => SagaStatus::Compensating,
            "COMPENSATED" => SagaStatus::Compensated,
            "FAILED" => SagaStatus::Failed,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
    Compensated,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Succeeded => "SUCCEEDED",
            StepStatus::Failed => "FAILED",
            StepStatus::Compensated => "COMPENSATED",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_started() {
        assert_eq!(SagaStatus::default(), SagaStatus::Started);
        assert_eq!(StepStatus::default(), StepStatus::Pending);
    }

    #[test]
    fn test_can_run() {
        assert!(SagaStatus::Started.can_run());
        assert!(!SagaStatus::Running.can_run());
        assert!(!SagaStatus::Completed.can_run());
    }

    #[test]
    fn test_can_compensate() {
        assert!(SagaStatus::Running.can_compensate());
        assert!(!SagaStatus::Started.can_compensate());
        assert!(!SagaStatus::Compensating.can_compensate());
        assert!(!SagaStatus::Failed.can_compensate());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SagaStatus::Started.is_terminal());
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
    }

    #[test]
    fn test_stored_form_round_trips() {
        for status in [
            SagaStatus::Started,
            SagaStatus::Running,
            SagaStatus::Completed,
            SagaStatus::Compensating,
            SagaStatus::Compensated,
            SagaStatus::Failed,
        ] {
            assert_eq!(SagaStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{status}\"")
            );
        }
        assert_eq!(SagaStatus::parse("Running"), None);
    }

    #[test]
    fn test_step_status_serialization() {
        let json = serde_json::to_string(&StepStatus::Succeeded).unwrap();
        assert_eq!(json, "\"SUCCEEDED\"");
    }
}
