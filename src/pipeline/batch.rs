//! Parallel execution over independent documents.
//!
//! Per-document processing is strictly sequential across stages, but
//! distinct source units have no data dependency and fan out across a rayon
//! worker pool. The pipeline holds no cross-document mutable state, so no
//! locking is needed beyond the pool's own dispatch.

use super::orchestrator::{Pipeline, PipelineReport};
use crate::core::Document;
use rayon::prelude::*;

impl Pipeline {
    /// Execute the pipeline over many independent documents in parallel.
    ///
    /// Reports come back in the input order. There is no cancellation
    /// primitive: a caller wanting to stop a batch simply does not dispatch
    /// further documents and lets in-flight ones finish.
    pub fn execute_batch(&self, documents: Vec<Document>) -> Vec<PipelineReport> {
        documents
            .into_par_iter()
            .map(|document| self.execute(document))
            .collect()
    }
}
