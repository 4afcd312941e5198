//! The shared document flowing through the analysis pipeline.
//!
//! A `Document` accumulates findings as it moves through stages:
//! 1. Scout → populates `pois`
//! 2. Relationship detection → populates `relationships` with initial evidence
//! 3. Context analysis → appends semantic evidence to existing relationships
//! 4. Aggregation → sets `confidence` on each relationship
//!
//! A document is immutable once handed to the next stage except via the
//! explicit `with_*` augment operations, each of which returns a new document
//! containing the union of prior content plus the addition. Stages never
//! delete or mutate content produced by earlier stages. The sequences use
//! persistent vectors, so augmenting and the orchestrator's
//! keep-input-on-failure fallback share structure instead of deep-copying.

use crate::core::{ConfidenceScore, Evidence, Poi, Relationship, StageError};
use crate::errors::{AnalysisError, AnalysisResult};
use im::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The unit of exchange between pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Identifier of the file or unit under analysis
    pub source_id: String,
    /// The unit's text; stages after the scout re-consult it
    pub source: String,
    /// Insertion order is discovery order; later stages rely on positional
    /// stability for cross-referencing
    pub pois: Vector<Poi>,
    pub relationships: Vector<Relationship>,
    /// Never silently dropped; the single source of truth for what went wrong
    pub diagnostics: Vector<StageError>,
}

impl Document {
    /// Create an empty document for a source unit.
    pub fn new(source_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source: source.into(),
            pois: Vector::new(),
            relationships: Vector::new(),
            diagnostics: Vector::new(),
        }
    }

    /// Append a point of interest, returning the augmented document.
    pub fn with_poi(mut self, poi: Poi) -> Self {
        self.pois.push_back(poi);
        self
    }

    /// Append a relationship, returning the augmented document.
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push_back(relationship);
        self
    }

    /// Append a diagnostic, returning the augmented document.
    pub fn with_diagnostic(mut self, error: StageError) -> Self {
        self.diagnostics.push_back(error);
        self
    }

    /// Attach evidence to an existing relationship, keyed by the evidence's
    /// stage name.
    ///
    /// A stage contributes at most one entry per relationship; a second
    /// insert from the same stage replaces its own earlier entry, never
    /// another stage's.
    pub fn with_evidence(mut self, relationship_id: &str, evidence: Evidence) -> AnalysisResult<Self> {
        let idx = self
            .relationships
            .iter()
            .position(|r| r.id == relationship_id)
            .ok_or_else(|| {
                AnalysisError::stage(
                    evidence.stage.clone(),
                    format!("evidence for unknown relationship '{relationship_id}'"),
                )
            })?;

        let mut updated = self.relationships[idx].clone();
        updated.evidence.insert(evidence.stage.clone(), evidence);
        self.relationships.set(idx, updated);
        Ok(self)
    }

    /// Set the aggregated confidence of a relationship.
    ///
    /// Confidence is assigned exactly once; assigning to an already-scored
    /// relationship is an invariant violation.
    pub fn with_confidence(
        mut self,
        relationship_id: &str,
        score: ConfidenceScore,
    ) -> AnalysisResult<Self> {
        let idx = self
            .relationships
            .iter()
            .position(|r| r.id == relationship_id)
            .ok_or_else(|| {
                AnalysisError::malformed(format!(
                    "confidence for unknown relationship '{relationship_id}'"
                ))
            })?;

        if self.relationships[idx].confidence.is_some() {
            return Err(AnalysisError::malformed(format!(
                "confidence already assigned for relationship '{relationship_id}'"
            )));
        }

        let mut updated = self.relationships[idx].clone();
        updated.confidence = Some(score);
        self.relationships.set(idx, updated);
        Ok(self)
    }

    /// Look up a POI by id.
    pub fn poi(&self, id: &str) -> Option<&Poi> {
        self.pois.iter().find(|p| p.id == id)
    }

    /// Look up a relationship by id.
    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// Whether any recorded diagnostic is fatal.
    pub fn has_fatal_diagnostic(&self) -> bool {
        self.diagnostics.iter().any(|d| d.fatal)
    }

    /// Check the document invariants.
    ///
    /// - POI and relationship ids are unique within the document
    /// - every relationship endpoint resolves to an existing POI
    /// - evidence strengths and confidence values lie in [0, 1]
    ///
    /// Violations are classified as malformed input, which is fatal for the
    /// pipeline run.
    pub fn validate(&self) -> AnalysisResult<()> {
        let mut poi_ids = HashSet::new();
        for poi in &self.pois {
            if !poi_ids.insert(poi.id.as_str()) {
                return Err(AnalysisError::malformed(format!(
                    "duplicate poi id '{}'",
                    poi.id
                )));
            }
        }

        let mut rel_ids = HashSet::new();
        for rel in &self.relationships {
            if !rel_ids.insert(rel.id.as_str()) {
                return Err(AnalysisError::malformed(format!(
                    "duplicate relationship id '{}'",
                    rel.id
                )));
            }
            for endpoint in [&rel.source_ref, &rel.target_ref] {
                if !poi_ids.contains(endpoint.as_str()) {
                    return Err(AnalysisError::malformed(format!(
                        "relationship '{}' references missing poi '{}'",
                        rel.id, endpoint
                    )));
                }
            }
            for evidence in rel.evidence.values() {
                if !(0.0..=1.0).contains(&evidence.strength) {
                    return Err(AnalysisError::malformed(format!(
                        "evidence strength {} out of range on relationship '{}'",
                        evidence.strength, rel.id
                    )));
                }
            }
            if let Some(score) = &rel.confidence {
                if !(0.0..=1.0).contains(&score.value) {
                    return Err(AnalysisError::malformed(format!(
                        "confidence value {} out of range on relationship '{}'",
                        score.value, rel.id
                    )));
                }
            }
        }

        Ok(())
    }
}
