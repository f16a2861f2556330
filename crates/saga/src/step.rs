use async_trait::async_trait;

use crate::context::SagaContext;
use crate::error::Result;

/// One forward action of a saga and the action that undoes it.
///
/// `compensate` may be called after an `execute` that only partly succeeded,
/// so it must tolerate state the forward action never reached.
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Stable name recorded in the saga log.
    fn name(&self) -> &str;

    async fn execute(&self, context: &mut SagaContext) -> Result<()>;

    async fn compensate(&self, context: &SagaContext) -> Result<()>;
}
