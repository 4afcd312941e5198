//! Pipeline stage abstractions for composable analysis workflows.
//!
//! This module defines the `Stage` trait every pipeline stage implements and
//! the boundary function that isolates stage failures. A stage consumes a
//! document and produces an augmented one; the boundary converts errors into
//! diagnostics so failure is data the orchestrator can inspect.

use crate::core::{Document, StageError};
use crate::errors::AnalysisError;
use std::time::{Duration, Instant};

/// A pipeline stage that augments a document.
///
/// # Contract
///
/// - The output document must be a superset of the input: a stage may only
///   append new POIs, new relationships, new evidence on existing
///   relationships, or new diagnostics. It must never remove or mutate
///   content created by a prior stage.
/// - A stage that cannot process its input returns an error instead of
///   propagating a panic; the boundary passes the input document through
///   unmodified.
pub trait Stage: Send + Sync {
    /// Get the stage name for diagnostics and progress reporting.
    fn name(&self) -> &str;

    /// Execute this stage over the given document.
    fn run(&self, document: Document) -> Result<Document, AnalysisError>;
}

/// The outcome of one stage invocation at the contract boundary.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// The stage's output, or the untouched input when the stage failed
    pub document: Document,
    /// Wall-clock time of the stage's own work, excluding orchestration
    pub elapsed: Duration,
    /// Present when the stage failed; fatality decides halt vs continue
    pub error: Option<StageError>,
}

/// Run one stage against a document, isolating failures.
///
/// The boundary validates the document on the way in and on the way out:
/// a malformed input is fatal, and a stage whose output violates the
/// document invariants is reported as fatal with the input passed through —
/// a failing stage can never leak a partially-written relationship to its
/// successors.
pub fn run_stage(stage: &dyn Stage, document: Document) -> StageOutcome {
    if let Err(err) = document.validate() {
        return StageOutcome {
            document,
            elapsed: Duration::ZERO,
            error: Some(err.into_stage_error(stage.name())),
        };
    }

    // Kept for pass-through when the stage fails.
    let fallback = document.clone();

    let start = Instant::now();
    let result = stage.run(document);
    let elapsed = start.elapsed();

    match result {
        Ok(output) => match output.validate() {
            Ok(()) => StageOutcome {
                document: output,
                elapsed,
                error: None,
            },
            Err(err) => StageOutcome {
                document: fallback,
                elapsed,
                error: Some(err.into_stage_error(stage.name())),
            },
        },
        Err(err) => StageOutcome {
            document: fallback,
            elapsed,
            error: Some(err.into_stage_error(stage.name())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Location, Poi, PoiKind, Relationship, RelationshipKind};

    struct AppendPoi;

    impl Stage for AppendPoi {
        fn name(&self) -> &str {
            "append_poi"
        }

        fn run(&self, document: Document) -> Result<Document, AnalysisError> {
            Ok(document.with_poi(Poi::new(
                "poi-test",
                PoiKind::Variable,
                "added",
                Location::line(1),
            )))
        }
    }

    struct AlwaysFails;

    impl Stage for AlwaysFails {
        fn name(&self) -> &str {
            "always_fails"
        }

        fn run(&self, _document: Document) -> Result<Document, AnalysisError> {
            Err(AnalysisError::stage("always_fails", "internal fault"))
        }
    }

    struct LeaksDanglingRef;

    impl Stage for LeaksDanglingRef {
        fn name(&self) -> &str {
            "leaky"
        }

        fn run(&self, document: Document) -> Result<Document, AnalysisError> {
            Ok(document.with_relationship(Relationship::new(
                "rel-bad",
                "poi-missing",
                "poi-also-missing",
                RelationshipKind::Calls,
            )))
        }
    }

    #[test]
    fn test_successful_stage_augments_document() {
        let outcome = run_stage(&AppendPoi, Document::new("unit", ""));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.document.pois.len(), 1);
    }

    #[test]
    fn test_failed_stage_passes_input_through() {
        let input = Document::new("unit", "x = 1").with_poi(Poi::new(
            "poi-1",
            PoiKind::Variable,
            "x",
            Location::line(1),
        ));
        let outcome = run_stage(&AlwaysFails, input.clone());

        let error = outcome.error.expect("stage failure should surface");
        assert!(!error.fatal);
        assert_eq!(error.stage, "always_fails");
        assert_eq!(outcome.document, input);
    }

    #[test]
    fn test_invalid_output_reported_fatal_with_input_kept() {
        let input = Document::new("unit", "");
        let outcome = run_stage(&LeaksDanglingRef, input.clone());

        let error = outcome.error.expect("invalid output should surface");
        assert!(error.fatal);
        assert_eq!(outcome.document, input);
    }

    #[test]
    fn test_malformed_input_is_fatal() {
        let malformed = Document::new("unit", "").with_relationship(Relationship::new(
            "rel-1",
            "nope",
            "nope",
            RelationshipKind::Calls,
        ));
        let outcome = run_stage(&AppendPoi, malformed);

        let error = outcome.error.expect("malformed input should surface");
        assert!(error.fatal);
        assert_eq!(error.stage, "append_poi");
    }
}
