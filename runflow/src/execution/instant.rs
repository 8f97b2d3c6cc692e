//! Executor that completes every stage immediately.

use async_trait::async_trait;

use super::{ExecutionOutcome, StageExecutionRequest, StageExecutor};
use crate::cancellation::CancellationToken;
use crate::models::ResourceUsage;

/// Succeeds at once with the standard payload and no resource figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantExecutor;

impl InstantExecutor {
    /// Creates the executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageExecutor for InstantExecutor {
    async fn execute(
        &self,
        request: &StageExecutionRequest,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        if cancel.is_cancelled() {
            return ExecutionOutcome::interrupted(0.0);
        }
        ExecutionOutcome::success(request.success_payload(), 0.0, ResourceUsage::default())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::request_for_first_stage;
    use super::*;

    #[test]
    fn test_instant_success() {
        let outcome = tokio_test::block_on(
            InstantExecutor::new().execute(&request_for_first_stage(), &CancellationToken::new()),
        );
        assert!(outcome.is_success());
        assert_eq!(outcome.resources, ResourceUsage::default());
    }

    #[test]
    fn test_instant_respects_prior_cancellation() {
        let token = CancellationToken::new();
        token.cancel("stop");
        let outcome =
            tokio_test::block_on(InstantExecutor::new().execute(&request_for_first_stage(), &token));
        assert!(!outcome.is_success());
    }
}
