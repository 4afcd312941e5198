//! Common type definitions for the document model exchanged between stages.

pub mod document;

pub use document::Document;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of code elements a scout can discover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiKind {
    Function,
    Class,
    Variable,
    Import,
    Module,
}

impl PoiKind {
    /// Get the display name for this kind
    pub fn display_name(&self) -> &str {
        match self {
            PoiKind::Function => "function",
            PoiKind::Class => "class",
            PoiKind::Variable => "variable",
            PoiKind::Import => "import",
            PoiKind::Module => "module",
        }
    }
}

/// Location in source code, a line or a line span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_line: Option<usize>,
}

impl Location {
    /// Create a single-line location
    pub fn line(line: usize) -> Self {
        Self {
            line,
            end_line: None,
        }
    }

    /// Create a span covering multiple lines
    pub fn span(line: usize, end_line: usize) -> Self {
        Self {
            line,
            end_line: Some(end_line),
        }
    }
}

/// A discovered code element worth reasoning about.
///
/// POIs are created exclusively by the scout stage and are read-only to all
/// downstream stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poi {
    /// Unique within a document, stable across stages
    pub id: String,
    pub kind: PoiKind,
    pub name: String,
    pub location: Location,
    /// Open-ended string mapping, e.g. the enclosing class of a method
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Poi {
    pub fn new(
        id: impl Into<String>,
        kind: PoiKind,
        name: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            location,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Kinds of directed links between POIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Calls,
    Inherits,
    Imports,
    References,
    Overrides,
}

/// Whether a piece of evidence supports or contradicts a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Supporting,
    Contradicting,
}

/// One stage's independent opinion about whether a relationship holds.
///
/// A stage contributes at most one evidence entry per relationship; multiple
/// matches within a stage are pre-reduced to a single strength before
/// insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Name of the contributing stage
    pub stage: String,
    /// The stage's own confidence in this relationship, in [0, 1]
    pub strength: f64,
    /// Free-text justification, not used in scoring
    pub rationale: String,
    pub polarity: Polarity,
}

impl Evidence {
    /// Create an evidence record; strength is clamped to [0, 1].
    pub fn new(
        stage: impl Into<String>,
        strength: f64,
        rationale: impl Into<String>,
        polarity: Polarity,
    ) -> Self {
        Self {
            stage: stage.into(),
            strength: strength.clamp(0.0, 1.0),
            rationale: rationale.into(),
            polarity,
        }
    }

    /// Supporting evidence with the given strength.
    pub fn supporting(stage: impl Into<String>, strength: f64, rationale: impl Into<String>) -> Self {
        Self::new(stage, strength, rationale, Polarity::Supporting)
    }

    /// Contradicting evidence with the given strength.
    pub fn contradicting(
        stage: impl Into<String>,
        strength: f64,
        rationale: impl Into<String>,
    ) -> Self {
        Self::new(stage, strength, rationale, Polarity::Contradicting)
    }
}

/// Aggregated confidence for a relationship, set exactly once by the
/// aggregation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceScore {
    /// Combined confidence in [0, 1]
    pub value: f64,
    /// Number of supporting evidence entries used
    pub support_count: usize,
    /// True when contradicting evidence is comparable in weight to support
    pub disputed: bool,
}

/// A directed, typed link between two POIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Unique within a document
    pub id: String,
    /// POI id of the source endpoint
    pub source_ref: String,
    /// POI id of the target endpoint
    pub target_ref: String,
    pub kind: RelationshipKind,
    /// One evidence entry per contributing stage, keyed by stage name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub evidence: BTreeMap<String, Evidence>,
    /// Populated only after the aggregation stage runs
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<ConfidenceScore>,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        source_ref: impl Into<String>,
        target_ref: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            id: id.into(),
            source_ref: source_ref.into(),
            target_ref: target_ref.into(),
            kind,
            evidence: BTreeMap::new(),
            confidence: None,
        }
    }

    /// Attach an evidence entry at construction time, keyed by its stage.
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.insert(evidence.stage.clone(), evidence);
        self
    }
}

/// A failure recorded by a stage or the orchestrator.
///
/// Fatal errors halt the pipeline for the current document; non-fatal errors
/// are recorded and processing continues with a possibly-incomplete document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageError {
    pub stage: String,
    pub message: String,
    pub fatal: bool,
}

impl StageError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>, fatal: bool) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            fatal,
        }
    }
}
