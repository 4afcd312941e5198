//! Sequencing of analysis stages over a document.
//!
//! The orchestrator runs a fixed, ordered list of stages, records per-stage
//! and total elapsed time, and decides whether to continue after a stage
//! reports an error: non-fatal errors are appended to the document's
//! diagnostics and the run continues; a fatal error halts the run with the
//! document as of the last successful stage.

use super::stage::{run_stage, Stage, StageOutcome};
use crate::core::Document;
use std::time::{Duration, Instant};

/// An ordered sequence of stages executed against one document at a time.
///
/// Stages are registered builder-style:
///
/// ```rust,ignore
/// let pipeline = Pipeline::new()
///     .stage(Scout::default())
///     .stage(RelationshipDetector::default())
///     .stage(ContextAnalyzer::default())
///     .stage(ConfidenceAggregator::default());
/// let report = pipeline.execute(document);
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage to the end of the pipeline.
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: Stage + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Add a stage conditionally.
    ///
    /// Useful for optional stages like context analysis.
    pub fn when<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Get the number of stages in this pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage in order over the document.
    ///
    /// Stages execute sequentially, never concurrently against the same
    /// document; later stages depend on POI and relationship ids assigned
    /// earlier. The returned document satisfies the model invariants even on
    /// partial failure, and every stage error is recorded in its
    /// diagnostics.
    pub fn execute(&self, document: Document) -> PipelineReport {
        let run_start = Instant::now();
        let mut current = document;
        let mut timings = Vec::with_capacity(self.stages.len());
        let mut halted = false;

        for (i, stage) in self.stages.iter().enumerate() {
            log::debug!(
                "stage {}/{}: {} ({})",
                i + 1,
                self.stages.len(),
                stage.name(),
                current.source_id
            );

            let StageOutcome {
                document,
                elapsed,
                error,
            } = run_stage(stage.as_ref(), current);

            timings.push(StageTiming {
                name: stage.name().to_string(),
                duration: elapsed,
            });

            match error {
                None => current = document,
                Some(stage_error) => {
                    log::warn!(
                        "stage '{}' reported {} error on {}: {}",
                        stage_error.stage,
                        if stage_error.fatal { "fatal" } else { "non-fatal" },
                        document.source_id,
                        stage_error.message
                    );
                    let fatal = stage_error.fatal;
                    current = document.with_diagnostic(stage_error);
                    if fatal {
                        halted = true;
                        break;
                    }
                }
            }
        }

        PipelineReport {
            document: current,
            timings,
            total: run_start.elapsed(),
            halted,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing information for one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageTiming {
    /// Name of the stage
    pub name: String,

    /// Time taken by the stage's own work
    pub duration: Duration,
}

impl StageTiming {
    /// Format the timing as a human-readable string.
    pub fn format(&self) -> String {
        format!("{}: {:.2}ms", self.name, self.duration.as_secs_f64() * 1000.0)
    }
}

/// The result of executing a pipeline over one document.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// The document as of the last stage that ran, diagnostics included
    pub document: Document,
    /// Per-stage timings in execution order
    pub timings: Vec<StageTiming>,
    /// Total wall-clock time, per-stage work plus orchestration overhead
    pub total: Duration,
    /// True when a fatal error stopped the run early
    pub halted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Location, Poi, PoiKind};
    use crate::errors::AnalysisError;

    struct Tag(&'static str);

    impl Stage for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&self, document: Document) -> Result<Document, AnalysisError> {
            let id = format!("poi-{}", self.0);
            Ok(document.with_poi(Poi::new(id, PoiKind::Variable, self.0, Location::line(1))))
        }
    }

    struct FailsWith(AnalysisError);

    impl Stage for FailsWith {
        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _document: Document) -> Result<Document, AnalysisError> {
            Err(self.0.clone())
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let report = Pipeline::new()
            .stage(Tag("first"))
            .stage(Tag("second"))
            .stage(Tag("third"))
            .execute(Document::new("unit", ""));

        let ids: Vec<_> = report.document.pois.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["poi-first", "poi-second", "poi-third"]);
        assert_eq!(report.timings.len(), 3);
        assert!(!report.halted);
    }

    #[test]
    fn test_nonfatal_error_continues() {
        let report = Pipeline::new()
            .stage(Tag("before"))
            .stage(FailsWith(AnalysisError::stage("failing", "boom")))
            .stage(Tag("after"))
            .execute(Document::new("unit", ""));

        assert!(!report.halted);
        assert_eq!(report.document.pois.len(), 2);
        assert_eq!(report.document.diagnostics.len(), 1);
        assert!(!report.document.diagnostics[0].fatal);
        // The failed stage is still timed.
        assert_eq!(report.timings.len(), 3);
    }

    #[test]
    fn test_fatal_error_halts() {
        let report = Pipeline::new()
            .stage(Tag("before"))
            .stage(FailsWith(AnalysisError::malformed("broken invariants")))
            .stage(Tag("never_runs"))
            .execute(Document::new("unit", ""));

        assert!(report.halted);
        // Document is as of the last successful stage plus the fatal diagnostic.
        assert_eq!(report.document.pois.len(), 1);
        assert_eq!(report.document.pois[0].id, "poi-before");
        assert!(report.document.has_fatal_diagnostic());
        assert_eq!(report.timings.len(), 2);
    }

    #[test]
    fn test_conditional_stage() {
        let with = Pipeline::new()
            .stage(Tag("base"))
            .when(true, |p| p.stage(Tag("extra")));
        let without = Pipeline::new()
            .stage(Tag("base"))
            .when(false, |p| p.stage(Tag("extra")));

        assert_eq!(with.stage_count(), 2);
        assert_eq!(without.stage_count(), 1);
    }

    #[test]
    fn test_total_covers_stage_time() {
        let report = Pipeline::new()
            .stage(Tag("one"))
            .stage(Tag("two"))
            .execute(Document::new("unit", ""));

        let stage_sum: Duration = report.timings.iter().map(|t| t.duration).sum();
        assert!(report.total >= stage_sum);
    }
}
