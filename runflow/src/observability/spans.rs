//! Span helpers for run execution.

use tracing::{info_span, Span};
use uuid::Uuid;

/// Span wrapping a run's coordinator task.
#[must_use]
pub fn run_span(pipeline_id: Uuid, run_id: Uuid) -> Span {
    info_span!("run", %pipeline_id, %run_id)
}

/// Span wrapping one stage execution.
#[must_use]
pub fn stage_span(stage: &str, order: u32) -> Span {
    info_span!("stage", stage, order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_can_be_entered() {
        let run = run_span(Uuid::new_v4(), Uuid::new_v4());
        let _guard = run.enter();
        let stage = stage_span("train", 1);
        let _inner = stage.enter();
    }
}
