use std::time::Duration;

use async_trait::async_trait;

use crate::context::SagaContext;
use crate::error::Result;
use crate::step::SagaStep;

/// Wraps a step so that its compensation is retried a bounded number of
/// times with a fixed pause between attempts. `execute` is not retried.
pub struct RetryCompensation<S> {
    inner: S,
    max_attempts: u32,
    backoff: Duration,
}

impl<S: SagaStep> RetryCompensation<S> {
    /// `max_attempts` is clamped to at least one.
    pub fn new(inner: S, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SagaStep> SagaStep for RetryCompensation<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, context: &mut SagaContext) -> Result<()> {
        self.inner.execute(context).await
    }

    async fn compensate(&self, context: &SagaContext) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.inner.compensate(context).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        step = self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "compensation attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
