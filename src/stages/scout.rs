//! Point-of-interest discovery.
//!
//! The scout scans the document's source text with a fixed pattern set and
//! records functions, classes, imports, module-level variables, and one
//! module POI for the unit itself. It is the only stage that creates POIs;
//! everything downstream treats them as read-only.

use super::line_of;
use crate::core::{Document, Location, Poi, PoiKind};
use crate::errors::AnalysisError;
use crate::pipeline::Stage;
use regex::Regex;
use std::collections::HashSet;

/// Stage name used in evidence and diagnostics.
pub const STAGE_NAME: &str = "scout";

struct ScoutPatterns {
    function: Regex,
    class: Regex,
    import_from: Regex,
    import_plain: Regex,
    variable: Regex,
}

impl ScoutPatterns {
    fn new() -> Self {
        Self {
            function: Regex::new(r"(?m)^([ \t]*)def[ \t]+([A-Za-z_]\w*)[ \t]*\(([^)]*)\)").unwrap(),
            class: Regex::new(r"(?m)^class[ \t]+([A-Za-z_]\w*)[ \t]*(?:\(([^)]*)\))?[ \t]*:").unwrap(),
            import_from: Regex::new(r"(?m)^from[ \t]+([\w.]+)[ \t]+import[ \t]+([ \t\w.,*]+)").unwrap(),
            import_plain: Regex::new(r"(?m)^import[ \t]+([\w.]+(?:[ \t]*,[ \t]*[\w.]+)*)").unwrap(),
            variable: Regex::new(r"(?m)^([A-Za-z_]\w*)[ \t]*=[^=]").unwrap(),
        }
    }
}

/// The POI discovery stage.
pub struct Scout {
    patterns: ScoutPatterns,
}

impl Scout {
    pub fn new() -> Self {
        Self {
            patterns: ScoutPatterns::new(),
        }
    }

    fn scan(&self, document: Document) -> Document {
        let source = document.source.clone();
        let module_name = document.source_id.clone();
        let mut next_id = 0usize;
        let mut fresh_id = || {
            next_id += 1;
            format!("poi-{next_id}")
        };

        let mut doc = document.with_poi(Poi::new(
            fresh_id(),
            PoiKind::Module,
            module_name,
            Location::line(1),
        ));

        // Classes first so methods can be attributed to them.
        let mut classes: Vec<(String, usize)> = Vec::new();
        for cap in self.patterns.class.captures_iter(&source) {
            let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let line = line_of(&source, cap.get(0).map(|m| m.start()).unwrap_or(0));
            let mut poi = Poi::new(fresh_id(), PoiKind::Class, name, Location::line(line));
            if let Some(bases) = cap.get(2) {
                let bases: Vec<&str> = bases
                    .as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .collect();
                if !bases.is_empty() {
                    poi = poi.with_metadata("bases", bases.join(","));
                }
            }
            classes.push((name.to_string(), line));
            doc = doc.with_poi(poi);
        }

        for cap in self.patterns.function.captures_iter(&source) {
            let indent = cap.get(1).map(|m| m.as_str().len()).unwrap_or(0);
            let name = cap.get(2).map(|m| m.as_str()).unwrap_or_default();
            let line = line_of(&source, cap.get(0).map(|m| m.start()).unwrap_or(0));
            let arity = cap
                .get(3)
                .map(|params| {
                    params
                        .as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty() && *p != "self")
                        .count()
                })
                .unwrap_or(0);

            let mut poi = Poi::new(fresh_id(), PoiKind::Function, name, Location::line(line))
                .with_metadata("arity", arity.to_string());

            // An indented def belongs to the nearest class defined above it.
            if indent > 0 {
                if let Some((class_name, _)) = classes
                    .iter()
                    .filter(|(_, class_line)| *class_line < line)
                    .next_back()
                {
                    poi = poi.with_metadata("class", class_name.clone());
                }
            }
            doc = doc.with_poi(poi);
        }

        for cap in self.patterns.import_from.captures_iter(&source) {
            let module = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let line = line_of(&source, cap.get(0).map(|m| m.start()).unwrap_or(0));
            for item in cap
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|i| !i.is_empty() && *i != "*")
            {
                doc = doc.with_poi(
                    Poi::new(fresh_id(), PoiKind::Import, item, Location::line(line))
                        .with_metadata("module", module),
                );
            }
        }

        for cap in self.patterns.import_plain.captures_iter(&source) {
            let line = line_of(&source, cap.get(0).map(|m| m.start()).unwrap_or(0));
            for module in cap
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
            {
                doc = doc.with_poi(
                    Poi::new(fresh_id(), PoiKind::Import, module, Location::line(line))
                        .with_metadata("module", module),
                );
            }
        }

        let mut seen_vars = HashSet::new();
        for cap in self.patterns.variable.captures_iter(&source) {
            let name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            if !seen_vars.insert(name.to_string()) {
                continue;
            }
            let line = line_of(&source, cap.get(0).map(|m| m.start()).unwrap_or(0));
            doc = doc.with_poi(Poi::new(
                fresh_id(),
                PoiKind::Variable,
                name,
                Location::line(line),
            ));
        }

        doc
    }
}

impl Default for Scout {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Scout {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    fn run(&self, document: Document) -> Result<Document, AnalysisError> {
        if !document.pois.is_empty() {
            return Err(AnalysisError::stage(
                STAGE_NAME,
                "document already contains points of interest",
            ));
        }
        Ok(self.scan(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const SAMPLE: &str = indoc! {"
        import os
        from typing import List, Optional

        MAX_RETRIES = 3

        class Connection:
            def open(self, url):
                return url

        class PooledConnection(Connection):
            def open(self, url):
                return self.pool.get(url)

        def fetch(conn, url):
            return conn.open(url)
    "};

    fn scouted() -> Document {
        Scout::new()
            .run(Document::new("sample.py", SAMPLE))
            .unwrap()
    }

    fn names_of(doc: &Document, kind: PoiKind) -> Vec<&str> {
        doc.pois
            .iter()
            .filter(|p| p.kind == kind)
            .map(|p| p.name.as_str())
            .collect()
    }

    #[test]
    fn test_discovers_all_poi_kinds() {
        let doc = scouted();

        assert_eq!(names_of(&doc, PoiKind::Module), vec!["sample.py"]);
        assert_eq!(
            names_of(&doc, PoiKind::Class),
            vec!["Connection", "PooledConnection"]
        );
        assert_eq!(
            names_of(&doc, PoiKind::Function),
            vec!["open", "open", "fetch"]
        );
        assert_eq!(
            names_of(&doc, PoiKind::Import),
            vec!["List", "Optional", "os"]
        );
        assert_eq!(names_of(&doc, PoiKind::Variable), vec!["MAX_RETRIES"]);
    }

    #[test]
    fn test_ids_unique_and_document_valid() {
        let doc = scouted();
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_methods_attributed_to_enclosing_class() {
        let doc = scouted();
        let methods: Vec<_> = doc
            .pois
            .iter()
            .filter(|p| p.kind == PoiKind::Function && p.name == "open")
            .collect();

        assert_eq!(methods[0].metadata.get("class"), Some(&"Connection".to_string()));
        assert_eq!(
            methods[1].metadata.get("class"),
            Some(&"PooledConnection".to_string())
        );

        let free = doc
            .pois
            .iter()
            .find(|p| p.name == "fetch")
            .unwrap();
        assert!(free.metadata.get("class").is_none());
        assert_eq!(free.metadata.get("arity"), Some(&"2".to_string()));
    }

    #[test]
    fn test_base_classes_recorded() {
        let doc = scouted();
        let pooled = doc
            .pois
            .iter()
            .find(|p| p.name == "PooledConnection")
            .unwrap();
        assert_eq!(pooled.metadata.get("bases"), Some(&"Connection".to_string()));
    }

    #[test]
    fn test_rerun_is_a_stage_error() {
        let doc = scouted();
        let err = Scout::new().run(doc).unwrap_err();
        assert!(!err.is_fatal());
    }
}
