// Export modules for library usage
pub mod aggregation;
pub mod core;
pub mod errors;
pub mod io;
pub mod pipeline;
pub mod stages;

// Re-export commonly used types
pub use crate::core::{
    ConfidenceScore, Document, Evidence, Location, Poi, PoiKind, Polarity, Relationship,
    RelationshipKind, StageError,
};

pub use crate::errors::{AnalysisError, AnalysisResult};

pub use crate::pipeline::{run_stage, Pipeline, PipelineReport, Stage, StageOutcome, StageTiming};

pub use crate::aggregation::{
    combine_independent, ranked, score_evidence, AggregationConfig, ConfidenceAggregator,
    ConfidenceBand, ConfidenceSummary,
};

pub use crate::stages::{standard_pipeline, ContextAnalyzer, RelationshipDetector, Scout};

pub use crate::io::{from_json, to_json};
