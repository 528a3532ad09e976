use crate::events::{RunId, TestId};

// ============================================================================
// Demultiplexer Lookup Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DemuxError {
    #[error("name not found for {test_class} and {test_id}")]
    TestNameNotFound { test_class: String, test_id: TestId },

    #[error("run not found: {0}")]
    RunNotFound(RunId),
}
