//! Unified error types for relmap analysis operations.
//!
//! Failure inside a stage is data, not control flow: stages return
//! `Result<Document, AnalysisError>` and the pipeline boundary converts
//! errors into [`StageError`] diagnostics so the orchestrator can make
//! halt/continue decisions by inspecting the result.

use crate::core::StageError;

/// Unified error type for analysis operations.
///
/// # Categories
///
/// - `MalformedInput`: a Document violates the model invariants (fatal)
/// - `StageExecution`: a stage's internal detection logic failed (non-fatal)
/// - `AggregationInput`: a relationship references a missing POI at
///   aggregation time, signalling an upstream contract violation (fatal)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// Document invariant violation: duplicate ids, dangling references,
    /// out-of-range strengths.
    #[error("malformed document: {message}")]
    MalformedInput { message: String },

    /// A stage's own intelligence failed; the input document is passed
    /// through unmodified and the pipeline continues.
    #[error("stage '{stage}' failed: {message}")]
    StageExecution { stage: String, message: String },

    /// The aggregator found a relationship whose endpoints do not resolve.
    #[error("aggregation input: {message}")]
    AggregationInput { message: String },
}

impl AnalysisError {
    /// Create a malformed-input error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a stage execution error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageExecution {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an aggregation input error.
    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::AggregationInput {
            message: message.into(),
        }
    }

    /// Fatal errors halt the pipeline for the current document.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StageExecution { .. })
    }

    /// Convert into the diagnostic record appended to a document.
    ///
    /// `reported_by` names the stage the orchestrator was running when the
    /// error surfaced; a `StageExecution` error keeps its own stage name.
    pub fn into_stage_error(self, reported_by: &str) -> StageError {
        let fatal = self.is_fatal();
        match self {
            Self::StageExecution { stage, message } => StageError {
                stage,
                message,
                fatal,
            },
            other => StageError {
                stage: reported_by.to_string(),
                message: other.to_string(),
                fatal,
            },
        }
    }
}

/// Result type alias used throughout the crate.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_by_category() {
        assert!(AnalysisError::malformed("dangling ref").is_fatal());
        assert!(AnalysisError::aggregation("missing poi").is_fatal());
        assert!(!AnalysisError::stage("scout", "bad pattern").is_fatal());
    }

    #[test]
    fn test_stage_execution_keeps_own_stage_name() {
        let err = AnalysisError::stage("context_analyzer", "scope scan failed");
        let diag = err.into_stage_error("orchestrator");
        assert_eq!(diag.stage, "context_analyzer");
        assert_eq!(diag.message, "scope scan failed");
        assert!(!diag.fatal);
    }

    #[test]
    fn test_malformed_attributed_to_reporting_stage() {
        let err = AnalysisError::malformed("duplicate poi id 'poi-3'");
        let diag = err.into_stage_error("scout");
        assert_eq!(diag.stage, "scout");
        assert!(diag.fatal);
        assert!(diag.message.contains("duplicate poi id"));
    }
}
