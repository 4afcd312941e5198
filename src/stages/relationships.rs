//! Candidate relationship detection.
//!
//! Links the scout's POIs with directed, typed relationships and attaches
//! this stage's own evidence to each one. Multiple matches for the same
//! candidate (several call sites, say) are pre-reduced to a single strength
//! value before insertion, so the stage contributes exactly one evidence
//! entry per relationship.

use super::line_of;
use crate::core::{Document, Evidence, Poi, PoiKind, Relationship, RelationshipKind};
use crate::errors::AnalysisError;
use crate::pipeline::Stage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stage name used in evidence and diagnostics.
pub const STAGE_NAME: &str = "relationship_detector";

/// Per-kind detection strengths, the stage's own confidence in a single
/// clean match of that kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionStrengths {
    #[serde(default = "default_calls_strength")]
    pub calls: f64,
    #[serde(default = "default_inherits_strength")]
    pub inherits: f64,
    #[serde(default = "default_imports_strength")]
    pub imports: f64,
    #[serde(default = "default_references_strength")]
    pub references: f64,
    #[serde(default = "default_overrides_strength")]
    pub overrides: f64,
}

fn default_calls_strength() -> f64 {
    0.85
}

fn default_inherits_strength() -> f64 {
    0.95
}

fn default_imports_strength() -> f64 {
    0.9
}

fn default_references_strength() -> f64 {
    0.7
}

fn default_overrides_strength() -> f64 {
    0.8
}

impl Default for DetectionStrengths {
    fn default() -> Self {
        Self {
            calls: default_calls_strength(),
            inherits: default_inherits_strength(),
            imports: default_imports_strength(),
            references: default_references_strength(),
            overrides: default_overrides_strength(),
        }
    }
}

impl DetectionStrengths {
    fn for_kind(&self, kind: RelationshipKind) -> f64 {
        match kind {
            RelationshipKind::Calls => self.calls,
            RelationshipKind::Inherits => self.inherits,
            RelationshipKind::Imports => self.imports,
            RelationshipKind::References => self.references,
            RelationshipKind::Overrides => self.overrides,
        }
    }
}

/// Accumulates candidates, folding repeat matches into one entry.
#[derive(Default)]
struct Candidates {
    entries: Vec<Candidate>,
    index: HashMap<(String, String, RelationshipKind), usize>,
}

struct Candidate {
    source_ref: String,
    target_ref: String,
    kind: RelationshipKind,
    rationale: String,
    matches: usize,
}

impl Candidates {
    fn add(&mut self, source_ref: &str, target_ref: &str, kind: RelationshipKind, rationale: String) {
        let key = (source_ref.to_string(), target_ref.to_string(), kind);
        match self.index.get(&key) {
            Some(&i) => self.entries[i].matches += 1,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(Candidate {
                    source_ref: source_ref.to_string(),
                    target_ref: target_ref.to_string(),
                    kind,
                    rationale,
                    matches: 1,
                });
            }
        }
    }
}

/// The relationship detection stage.
#[derive(Debug, Clone, Default)]
pub struct RelationshipDetector {
    strengths: DetectionStrengths,
}

impl RelationshipDetector {
    pub fn new(strengths: DetectionStrengths) -> Self {
        Self { strengths }
    }

    /// Reduce repeat matches into one strength: each extra match nudges the
    /// base strength up, capped below certainty.
    fn reduced_strength(&self, kind: RelationshipKind, matches: usize) -> f64 {
        let base = self.strengths.for_kind(kind);
        (base + 0.02 * (matches.saturating_sub(1) as f64)).min(0.98)
    }

    fn detect(&self, document: &Document) -> Result<Candidates, AnalysisError> {
        let source = &document.source;
        let mut candidates = Candidates::default();

        let functions: Vec<&Poi> = document
            .pois
            .iter()
            .filter(|p| p.kind == PoiKind::Function)
            .collect();
        let classes: HashMap<&str, &Poi> = document
            .pois
            .iter()
            .filter(|p| p.kind == PoiKind::Class)
            .map(|p| (p.name.as_str(), p))
            .collect();
        let module = document.pois.iter().find(|p| p.kind == PoiKind::Module);

        // Inheritance from recorded base lists.
        for subclass in document.pois.iter().filter(|p| p.kind == PoiKind::Class) {
            let Some(bases) = subclass.metadata.get("bases") else {
                continue;
            };
            for base in bases.split(',').map(str::trim).filter(|b| !b.is_empty()) {
                if let Some(base_poi) = classes.get(base) {
                    candidates.add(
                        &subclass.id,
                        &base_poi.id,
                        RelationshipKind::Inherits,
                        format!("'{}' lists '{}' in its base list", subclass.name, base),
                    );
                }
            }
        }

        // Method overrides: a method shadowing a same-named method on a base.
        for method in &functions {
            let Some(class_name) = method.metadata.get("class") else {
                continue;
            };
            let Some(class_poi) = classes.get(class_name.as_str()) else {
                continue;
            };
            let Some(bases) = class_poi.metadata.get("bases") else {
                continue;
            };
            for base in bases.split(',').map(str::trim) {
                if let Some(overridden) = functions.iter().find(|f| {
                    f.name == method.name && f.metadata.get("class").map(String::as_str) == Some(base)
                }) {
                    candidates.add(
                        &method.id,
                        &overridden.id,
                        RelationshipKind::Overrides,
                        format!("'{}.{}' shadows '{}.{}'", class_name, method.name, base, method.name),
                    );
                }
            }
        }

        // Call sites: an occurrence of `name(` outside any def line for that
        // name, attributed to the nearest enclosing function above it.
        let def_lines: HashMap<&str, Vec<usize>> =
            functions.iter().fold(HashMap::new(), |mut acc, f| {
                acc.entry(f.name.as_str()).or_default().push(f.location.line);
                acc
            });
        for callee in &functions {
            if functions
                .iter()
                .any(|f| f.name == callee.name && f.location.line < callee.location.line)
            {
                continue; // one pass per name, first declaration wins
            }
            let pattern = Regex::new(&format!(r"\b{}[ \t]*\(", regex::escape(&callee.name)))
                .map_err(|e| AnalysisError::stage(STAGE_NAME, format!("call pattern: {e}")))?;
            for m in pattern.find_iter(source) {
                let line = line_of(source, m.start());
                if def_lines
                    .get(callee.name.as_str())
                    .is_some_and(|lines| lines.contains(&line))
                {
                    continue;
                }
                let caller = functions
                    .iter()
                    .filter(|f| f.location.line < line)
                    .max_by_key(|f| f.location.line);
                let (caller_id, caller_name) = match caller {
                    Some(f) => (f.id.as_str(), f.name.as_str()),
                    None => match module {
                        Some(m) => (m.id.as_str(), m.name.as_str()),
                        None => continue,
                    },
                };
                if caller_id == callee.id {
                    continue;
                }
                candidates.add(
                    caller_id,
                    &callee.id,
                    RelationshipKind::Calls,
                    format!("'{}' calls '{}' at line {}", caller_name, callee.name, line),
                );
            }
        }

        // Imports belong to the module unit.
        if let Some(module) = module {
            for import in document.pois.iter().filter(|p| p.kind == PoiKind::Import) {
                let from = import
                    .metadata
                    .get("module")
                    .cloned()
                    .unwrap_or_else(|| import.name.clone());
                candidates.add(
                    &module.id,
                    &import.id,
                    RelationshipKind::Imports,
                    format!("module imports '{}' from '{}'", import.name, from),
                );
            }
        }

        // Variable references from enclosing functions.
        for variable in document.pois.iter().filter(|p| p.kind == PoiKind::Variable) {
            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&variable.name)))
                .map_err(|e| AnalysisError::stage(STAGE_NAME, format!("reference pattern: {e}")))?;
            for m in pattern.find_iter(source) {
                let line = line_of(source, m.start());
                if line == variable.location.line {
                    continue;
                }
                let Some(reader) = functions
                    .iter()
                    .filter(|f| f.location.line < line)
                    .max_by_key(|f| f.location.line)
                else {
                    continue;
                };
                candidates.add(
                    &reader.id,
                    &variable.id,
                    RelationshipKind::References,
                    format!("'{}' reads '{}' at line {}", reader.name, variable.name, line),
                );
            }
        }

        Ok(candidates)
    }
}

impl Stage for RelationshipDetector {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    fn run(&self, document: Document) -> Result<Document, AnalysisError> {
        if document.pois.is_empty() {
            return Err(AnalysisError::stage(
                STAGE_NAME,
                "no points of interest to relate; scout has not run",
            ));
        }
        if !document.relationships.is_empty() {
            return Err(AnalysisError::stage(
                STAGE_NAME,
                "document already contains relationships",
            ));
        }

        let candidates = self.detect(&document)?;

        let mut doc = document;
        for (i, candidate) in candidates.entries.iter().enumerate() {
            let strength = self.reduced_strength(candidate.kind, candidate.matches);
            let rationale = if candidate.matches > 1 {
                format!("{} ({} sites)", candidate.rationale, candidate.matches)
            } else {
                candidate.rationale.clone()
            };
            doc = doc.with_relationship(
                Relationship::new(
                    format!("rel-{}", i + 1),
                    &candidate.source_ref,
                    &candidate.target_ref,
                    candidate.kind,
                )
                .with_evidence(Evidence::supporting(STAGE_NAME, strength, rationale)),
            );
        }
        Ok(doc)
    }
}
