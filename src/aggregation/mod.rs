//! Evidence aggregation and confidence scoring.
//!
//! The final pipeline stage reconciles the independent, possibly
//! contradictory opinions collected on each relationship into one
//! confidence score. Supporting evidence combines under an
//! independence-assuming noisy-OR, contradicting evidence combines the same
//! way and scales the result down, and a relationship whose contradiction is
//! comparable in magnitude to its support is flagged as disputed for manual
//! review.
//!
//! Scoring is a pure function of the evidence: identical evidence produces
//! identical scores, and insertion order does not matter because the
//! combination is commutative and associative.

use crate::core::{ConfidenceScore, Document, Evidence, Polarity, Relationship};
use crate::errors::AnalysisError;
use crate::pipeline::Stage;
use serde::{Deserialize, Serialize};

/// Stage name under which aggregation reports diagnostics.
pub const STAGE_NAME: &str = "confidence_aggregator";

/// Tunable thresholds for dispute detection and confidence banding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregationConfig {
    /// Minimum combined contradicting weight for a dispute
    #[serde(default = "default_dispute_floor")]
    pub dispute_floor: f64,
    /// Contradiction must reach this fraction of the supporting weight
    #[serde(default = "default_dispute_ratio")]
    pub dispute_ratio: f64,
    /// Scores at or above this value band as high confidence
    #[serde(default = "default_high_band")]
    pub high_band: f64,
    /// Scores at or above this value band as medium confidence
    #[serde(default = "default_medium_band")]
    pub medium_band: f64,
}

fn default_dispute_floor() -> f64 {
    0.3
}

fn default_dispute_ratio() -> f64 {
    0.5
}

fn default_high_band() -> f64 {
    0.8
}

fn default_medium_band() -> f64 {
    0.6
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            dispute_floor: default_dispute_floor(),
            dispute_ratio: default_dispute_ratio(),
            high_band: default_high_band(),
            medium_band: default_medium_band(),
        }
    }
}

/// Combine independent detector probabilities: `1 − Π(1 − strength)`.
///
/// Monotonically non-decreasing as evidence is added and saturating toward
/// 1, modeling multiple independent witnesses with diminishing marginal
/// return. Empty input combines to 0.
pub fn combine_independent<'a, I>(strengths: I) -> f64
where
    I: IntoIterator<Item = &'a Evidence>,
{
    let miss: f64 = strengths
        .into_iter()
        .map(|e| 1.0 - e.strength.clamp(0.0, 1.0))
        .product();
    (1.0 - miss).clamp(0.0, 1.0)
}

/// Score one relationship's evidence set.
///
/// A relationship with no evidence scores 0 and is never disputed: there is
/// no basis for confidence either way.
pub fn score_evidence<'a, I>(evidence: I, config: &AggregationConfig) -> ConfidenceScore
where
    I: IntoIterator<Item = &'a Evidence> + Clone,
{
    let supporting = || {
        evidence
            .clone()
            .into_iter()
            .filter(|e| e.polarity == Polarity::Supporting)
    };
    let contradicting = || {
        evidence
            .clone()
            .into_iter()
            .filter(|e| e.polarity == Polarity::Contradicting)
    };

    let combined_supporting = combine_independent(supporting());
    let combined_contradicting = combine_independent(contradicting());

    let value = (combined_supporting * (1.0 - combined_contradicting)).clamp(0.0, 1.0);
    let disputed = combined_contradicting >= config.dispute_floor
        && combined_contradicting >= config.dispute_ratio * combined_supporting;

    ConfidenceScore {
        value,
        support_count: supporting().count(),
        disputed,
    }
}

/// The aggregation stage.
///
/// Assigns `confidence` exactly once per relationship; relationships that
/// already carry a score are left untouched, which makes a second run over
/// the same document a no-op.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceAggregator {
    config: AggregationConfig,
}

impl ConfidenceAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }
}

impl Stage for ConfidenceAggregator {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    fn run(&self, document: Document) -> Result<Document, AnalysisError> {
        // A dangling reference here means an upstream stage broke its
        // contract; that is not recoverable.
        for rel in &document.relationships {
            for endpoint in [&rel.source_ref, &rel.target_ref] {
                if document.poi(endpoint).is_none() {
                    return Err(AnalysisError::aggregation(format!(
                        "relationship '{}' references missing poi '{}'",
                        rel.id, endpoint
                    )));
                }
            }
        }

        let pending: Vec<(String, ConfidenceScore)> = document
            .relationships
            .iter()
            .filter(|rel| rel.confidence.is_none())
            .map(|rel| {
                let score = score_evidence(rel.evidence.values(), &self.config);
                (rel.id.clone(), score)
            })
            .collect();

        let mut scored = document;
        for (id, score) in pending {
            scored = scored.with_confidence(&id, score)?;
        }
        Ok(scored)
    }
}

/// Confidence bands used for reporting distribution summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl AggregationConfig {
    /// Band a confidence value per the configured thresholds.
    pub fn band(&self, value: f64) -> ConfidenceBand {
        if value >= self.high_band {
            ConfidenceBand::High
        } else if value >= self.medium_band {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Distribution summary over an aggregated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub disputed: usize,
    pub mean_confidence: f64,
}

impl ConfidenceSummary {
    /// Summarize the scored relationships of a document.
    ///
    /// Relationships not yet aggregated count into the low band with value 0.
    pub fn from_document(document: &Document, config: &AggregationConfig) -> Self {
        let mut summary = Self {
            total: document.relationships.len(),
            high: 0,
            medium: 0,
            low: 0,
            disputed: 0,
            mean_confidence: 0.0,
        };

        let mut value_sum = 0.0;
        for rel in &document.relationships {
            let (value, disputed) = rel
                .confidence
                .as_ref()
                .map(|c| (c.value, c.disputed))
                .unwrap_or((0.0, false));
            value_sum += value;
            if disputed {
                summary.disputed += 1;
            }
            match config.band(value) {
                ConfidenceBand::High => summary.high += 1,
                ConfidenceBand::Medium => summary.medium += 1,
                ConfidenceBand::Low => summary.low += 1,
            }
        }

        if summary.total > 0 {
            summary.mean_confidence = value_sum / summary.total as f64;
        }
        summary
    }
}

/// Rank relationships for the final report.
///
/// Sorted by confidence value descending, support count descending, then
/// relationship id ascending — a total, deterministic order so identical
/// documents always produce identical reports.
pub fn ranked(document: &Document) -> Vec<&Relationship> {
    let mut rels: Vec<&Relationship> = document.relationships.iter().collect();
    rels.sort_by(|a, b| {
        let (av, asup) = a
            .confidence
            .as_ref()
            .map(|c| (c.value, c.support_count))
            .unwrap_or((0.0, 0));
        let (bv, bsup) = b
            .confidence
            .as_ref()
            .map(|c| (c.value, c.support_count))
            .unwrap_or((0.0, 0));
        bv.total_cmp(&av)
            .then(bsup.cmp(&asup))
            .then(a.id.cmp(&b.id))
    });
    rels
}
