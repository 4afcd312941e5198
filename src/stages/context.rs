//! Scope-aware semantic corroboration.
//!
//! The context analyzer re-examines each detected relationship against the
//! surrounding source and either corroborates it or disputes it. Its
//! sub-signals (locality, repetition, signature agreement) are reduced to a
//! single evidence entry per relationship before insertion; a dominant
//! negative signal flips the entry's polarity to contradicting.

use super::line_of;
use crate::core::{Document, Evidence, Poi, Relationship, RelationshipKind};
use crate::errors::AnalysisError;
use crate::pipeline::Stage;
use regex::Regex;

/// Stage name used in evidence and diagnostics.
pub const STAGE_NAME: &str = "context_analyzer";

/// The semantic corroboration stage.
pub struct ContextAnalyzer {
    super_init: Regex,
}

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self {
            super_init: Regex::new(r"super\(\)\s*\.\s*__init__|super\(\)\s*\.\s*\w+\(").unwrap(),
        }
    }

    fn analyze(&self, document: &Document, rel: &Relationship) -> Option<Evidence> {
        let source_poi = document.poi(&rel.source_ref)?;
        let target = document.poi(&rel.target_ref)?;

        match rel.kind {
            RelationshipKind::Calls => self.analyze_call(document, source_poi, target),
            RelationshipKind::Inherits => self.analyze_inheritance(document, source_poi, target),
            RelationshipKind::Imports => Some(analyze_import(document, target)),
            RelationshipKind::References => Some(analyze_reference(document, target)),
            RelationshipKind::Overrides => Some(analyze_override(source_poi, target)),
        }
    }

    fn analyze_call(&self, document: &Document, caller: &Poi, callee: &Poi) -> Option<Evidence> {
        let pattern = Regex::new(&format!(r"\b{}[ \t]*\(", regex::escape(&callee.name))).ok()?;
        let def_lines: Vec<usize> = document
            .pois
            .iter()
            .filter(|p| p.name == callee.name && p.kind == callee.kind)
            .map(|p| p.location.line)
            .collect();

        let mut sites = 0usize;
        let mut arity_match = false;
        let mut arity_checked = false;
        let declared_arity: Option<usize> = callee
            .metadata
            .get("arity")
            .and_then(|a| a.parse().ok());

        for m in pattern.find_iter(&document.source) {
            let line = line_of(&document.source, m.start());
            if def_lines.contains(&line) {
                continue;
            }
            sites += 1;
            if let (Some(declared), Some(found)) =
                (declared_arity, call_site_arg_count(&document.source, m.end() - 1))
            {
                arity_checked = true;
                if found == declared {
                    arity_match = true;
                }
            }
        }

        if sites == 0 {
            return None;
        }
        if arity_checked && !arity_match {
            return Some(Evidence::contradicting(
                STAGE_NAME,
                0.6,
                format!(
                    "no call site of '{}' matches its declared arity",
                    callee.name
                ),
            ));
        }

        let same_class = match (caller.metadata.get("class"), callee.metadata.get("class")) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        let mut strength: f64 = 0.4;
        let mut notes = vec![format!("callee defined in the same unit as '{}'", caller.name)];
        if sites >= 2 {
            strength += 0.2;
            notes.push(format!("{sites} call sites"));
        }
        if same_class {
            strength += 0.25;
            notes.push("caller and callee share a class".to_string());
        }
        Some(Evidence::supporting(
            STAGE_NAME,
            strength.min(0.9),
            notes.join("; "),
        ))
    }

    fn analyze_inheritance(
        &self,
        document: &Document,
        subclass: &Poi,
        base: &Poi,
    ) -> Option<Evidence> {
        let body = class_body(document, subclass);
        if self.super_init.is_match(body) || body.contains(&format!("{}.", base.name)) {
            Some(Evidence::supporting(
                STAGE_NAME,
                0.75,
                format!("'{}' delegates to its base within its body", subclass.name),
            ))
        } else {
            Some(Evidence::supporting(
                STAGE_NAME,
                0.4,
                format!("'{}' appears only in the class header", base.name),
            ))
        }
    }
}

fn analyze_import(document: &Document, import: &Poi) -> Evidence {
    let uses = name_occurrences(&document.source, &import.name)
        .into_iter()
        .filter(|&line| line > import.location.line)
        .count();
    if uses > 0 {
        Evidence::supporting(
            STAGE_NAME,
            0.7,
            format!("imported name '{}' used {} time(s)", import.name, uses),
        )
    } else {
        Evidence::contradicting(
            STAGE_NAME,
            0.5,
            format!("'{}' never referenced after its import", import.name),
        )
    }
}

fn analyze_reference(document: &Document, variable: &Poi) -> Evidence {
    let uses = name_occurrences(&document.source, &variable.name)
        .into_iter()
        .filter(|&line| line != variable.location.line)
        .count();
    if uses >= 2 {
        Evidence::supporting(
            STAGE_NAME,
            0.5,
            format!("'{}' read at {} sites", variable.name, uses),
        )
    } else {
        Evidence::supporting(
            STAGE_NAME,
            0.35,
            format!("'{}' read in a single scope", variable.name),
        )
    }
}

fn analyze_override(method: &Poi, overridden: &Poi) -> Evidence {
    let arity = |p: &Poi| p.metadata.get("arity").cloned();
    match (arity(method), arity(overridden)) {
        (Some(a), Some(b)) if a == b => Evidence::supporting(
            STAGE_NAME,
            0.8,
            format!("'{}' keeps the overridden signature arity", method.name),
        ),
        (Some(_), Some(_)) => Evidence::contradicting(
            STAGE_NAME,
            0.55,
            format!("'{}' arity differs from the method it shadows", method.name),
        ),
        _ => Evidence::supporting(STAGE_NAME, 0.4, "shadowing by name only".to_string()),
    }
}

/// Count of lines on which `name` occurs as a whole word.
fn name_occurrences(source: &str, name: &str) -> Vec<usize> {
    match Regex::new(&format!(r"\b{}\b", regex::escape(name))) {
        Ok(pattern) => pattern
            .find_iter(source)
            .map(|m| line_of(source, m.start()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Naive argument count at a call site; `open_paren` indexes the `(`.
fn call_site_arg_count(source: &str, open_paren: usize) -> Option<usize> {
    let rest = source.get(open_paren + 1..)?;
    let close = rest.find(')')?;
    let inner = rest[..close].trim();
    if inner.is_empty() {
        Some(0)
    } else {
        Some(inner.split(',').count())
    }
}

/// The body of a class: from its header to the next column-zero class
/// header, or end of source.
fn class_body<'a>(document: &'a Document, class_poi: &Poi) -> &'a str {
    let mut start = None;
    let mut end = document.source.len();
    let mut offset = 0;
    for (i, line) in document.source.split_inclusive('\n').enumerate() {
        let line_no = i + 1;
        if line_no == class_poi.location.line {
            start = Some(offset);
        } else if start.is_some() && line.starts_with("class ") {
            end = offset;
            break;
        }
        offset += line.len();
    }
    match start {
        Some(s) => &document.source[s..end],
        None => "",
    }
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for ContextAnalyzer {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    fn run(&self, document: Document) -> Result<Document, AnalysisError> {
        let additions: Vec<(String, Evidence)> = document
            .relationships
            .iter()
            .filter_map(|rel| self.analyze(&document, rel).map(|e| (rel.id.clone(), e)))
            .collect();

        let mut doc = document;
        for (rel_id, evidence) in additions {
            doc = doc.with_evidence(&rel_id, evidence)?;
        }
        Ok(doc)
    }
}
