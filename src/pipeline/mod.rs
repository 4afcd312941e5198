//! Staged analysis pipeline: the stage contract, the orchestrator, and
//! parallel batch execution over independent documents.

pub mod batch;
pub mod orchestrator;
pub mod stage;

pub use orchestrator::{Pipeline, PipelineReport, StageTiming};
pub use stage::{run_stage, Stage, StageOutcome};
