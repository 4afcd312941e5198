//! End-to-end pipeline behavior: stage sequencing, invariant preservation,
//! and partial-failure containment.

use indoc::indoc;
use pretty_assertions::assert_eq;
use relmap::{
    standard_pipeline, AggregationConfig, AnalysisError, Document, Location, Pipeline, Poi,
    PoiKind, Stage,
};

const SAMPLE: &str = indoc! {"
    import json
    import unused_helper

    RETRY_LIMIT = 5

    class Codec:
        def encode(self, value):
            return json.dumps(value)

    class VersionedCodec(Codec):
        def encode(self, value):
            tag(value)
            return value

    def tag(value):
        for _ in range(RETRY_LIMIT):
            pass
        return value
"};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_standard_pipeline_scores_every_relationship() {
    init_logging();
    let pipeline = standard_pipeline(AggregationConfig::default());
    let report = pipeline.execute(Document::new("codec.py", SAMPLE));

    assert!(!report.halted);
    assert!(report.document.diagnostics.is_empty());
    assert!(!report.document.relationships.is_empty());
    for rel in &report.document.relationships {
        let score = rel
            .confidence
            .as_ref()
            .unwrap_or_else(|| panic!("relationship '{}' left unscored", rel.id));
        assert!((0.0..=1.0).contains(&score.value));
    }
    assert_eq!(report.timings.len(), 4);
}

#[test]
fn test_every_reference_resolves_after_execute() {
    init_logging();
    let pipeline = standard_pipeline(AggregationConfig::default());
    let report = pipeline.execute(Document::new("codec.py", SAMPLE));

    let document = &report.document;
    assert!(document.validate().is_ok());
    for rel in &document.relationships {
        assert!(document.poi(&rel.source_ref).is_some());
        assert!(document.poi(&rel.target_ref).is_some());
    }
}

/// A stage that fails without touching the document.
struct Flaky;

impl Stage for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn run(&self, _document: Document) -> Result<Document, AnalysisError> {
        Err(AnalysisError::stage("flaky", "detector crashed"))
    }
}

/// A stage that appends one POI with the given id.
struct Append(&'static str);

impl Stage for Append {
    fn name(&self) -> &str {
        self.0
    }

    fn run(&self, document: Document) -> Result<Document, AnalysisError> {
        Ok(document.with_poi(Poi::new(
            format!("poi-{}", self.0),
            PoiKind::Variable,
            self.0,
            Location::line(1),
        )))
    }
}

#[test]
fn test_nonfatal_failure_in_stage_two_of_four() {
    init_logging();
    let pipeline = Pipeline::new()
        .stage(Append("one"))
        .stage(Flaky)
        .stage(Append("three"))
        .stage(Append("four"));

    let report = pipeline.execute(Document::new("unit", ""));

    assert!(!report.halted);
    // Stages 3 and 4 still ran.
    let ids: Vec<_> = report.document.pois.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["poi-one", "poi-three", "poi-four"]);
    // The failure is recorded, not discarded.
    assert_eq!(report.document.diagnostics.len(), 1);
    assert_eq!(report.document.diagnostics[0].stage, "flaky");
    assert!(!report.document.diagnostics[0].fatal);
    assert_eq!(report.timings.len(), 4);
}

#[test]
fn test_fatal_failure_halts_with_last_good_document() {
    init_logging();
    struct Corrupt;

    impl Stage for Corrupt {
        fn name(&self) -> &str {
            "corrupt"
        }

        fn run(&self, _document: Document) -> Result<Document, AnalysisError> {
            Err(AnalysisError::malformed("upstream contract violation"))
        }
    }

    let pipeline = Pipeline::new()
        .stage(Append("one"))
        .stage(Corrupt)
        .stage(Append("never"));

    let report = pipeline.execute(Document::new("unit", ""));

    assert!(report.halted);
    let ids: Vec<_> = report.document.pois.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["poi-one"]);
    assert!(report.document.has_fatal_diagnostic());
}

#[test]
fn test_batch_matches_sequential_execution() {
    init_logging();
    let pipeline = standard_pipeline(AggregationConfig::default());
    let units: Vec<Document> = (0..8)
        .map(|i| Document::new(format!("unit-{i}.py"), SAMPLE))
        .collect();

    let sequential: Vec<Document> = units
        .iter()
        .map(|d| pipeline.execute(d.clone()).document)
        .collect();
    let parallel: Vec<Document> = pipeline
        .execute_batch(units)
        .into_iter()
        .map(|r| r.document)
        .collect();

    assert_eq!(sequential, parallel);
}

#[test]
fn test_round_trip_between_stages() {
    init_logging();
    // A document can leave the process between stages and come back.
    let scouted = relmap::Scout::new()
        .run(Document::new("codec.py", SAMPLE))
        .unwrap();
    let json = relmap::to_json(&scouted).unwrap();
    let restored = relmap::from_json(&json).unwrap();
    assert_eq!(restored, scouted);

    let finished = Pipeline::new()
        .stage(relmap::RelationshipDetector::default())
        .stage(relmap::ContextAnalyzer::new())
        .stage(relmap::ConfidenceAggregator::default())
        .execute(restored);
    assert!(!finished.halted);
    assert!(finished.document.relationships.iter().all(|r| r.confidence.is_some()));
}
