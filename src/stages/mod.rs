//! Reference stage implementations for the analysis pipeline.
//!
//! Each stage is a pluggable collaborator behind the [`Stage`] contract:
//! the scout discovers points of interest, the relationship detector links
//! them with initial evidence, and the context analyzer corroborates or
//! disputes those links from the surrounding scope. Every detector owns its
//! own immutable pattern set, compiled at construction.
//!
//! [`Stage`]: crate::pipeline::Stage

pub mod context;
pub mod relationships;
pub mod scout;

pub use context::ContextAnalyzer;
pub use relationships::RelationshipDetector;
pub use scout::Scout;

use crate::aggregation::{AggregationConfig, ConfidenceAggregator};
use crate::pipeline::Pipeline;

/// The standard four-stage pipeline:
/// scout → relationship detector → context analyzer → confidence aggregator.
pub fn standard_pipeline(config: AggregationConfig) -> Pipeline {
    Pipeline::new()
        .stage(Scout::new())
        .stage(RelationshipDetector::default())
        .stage(ContextAnalyzer::new())
        .stage(ConfidenceAggregator::new(config))
}

/// 1-based line number of a byte offset within `content`.
pub(crate) fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of() {
        let content = "a\nbb\nccc\n";
        assert_eq!(line_of(content, 0), 1);
        assert_eq!(line_of(content, 2), 2);
        assert_eq!(line_of(content, 5), 3);
    }

    #[test]
    fn test_standard_pipeline_has_four_stages() {
        let pipeline = standard_pipeline(AggregationConfig::default());
        assert_eq!(pipeline.stage_count(), 4);
    }
}
