use rhythm_weaver::model::{Document, Measure, PulseState, Sequence, Tempo};
use rhythm_weaver::storage::document::{open, parse, save};

#[test]
fn roundtrip_document_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("groove.json");

    let doc = Document {
        tempo: Tempo::new(132).expect("tempo"),
        measures: Sequence::new(vec![
            Measure::default(),
            Measure::from_pattern(vec![PulseState::Strong, PulseState::Silent, PulseState::Accent])
                .expect("measure"),
        ]),
    };
    save(&doc, &path).expect("save");
    let out = open(&path).expect("open");

    assert_eq!(out, doc);
}

#[test]
fn saved_shape_uses_ordinals() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("one.json");
    save(&Document::starter(), &path).expect("save");

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(
        value,
        serde_json::json!({
            "tempo": 120,
            "measures": [{ "subdivisions": 4, "pattern": [2, 1, 1, 1] }]
        })
    );
}

#[test]
fn lenient_fields_fall_back_to_defaults() {
    let doc = parse(r#"{"tempo": 0, "measures": null}"#).expect("parse");
    assert_eq!(doc.tempo.bpm(), 120);
    assert!(doc.measures.is_empty());

    let doc = parse(r#"{"tempo": 900}"#).expect("parse");
    assert_eq!(doc.tempo.bpm(), 300);

    let doc = parse(r#"{"measures": [{"subdivisions": 2, "pattern": [0, 2]}]}"#).expect("parse");
    assert_eq!(doc.tempo.bpm(), 120);
    assert_eq!(doc.measures.len(), 1);
}

#[test]
fn invalid_measures_reject_the_whole_document() {
    for bad in [
        r#"{"measures": [{"subdivisions": 17, "pattern": []}]}"#,
        r#"{"measures": [{"subdivisions": 2, "pattern": [1]}]}"#,
        r#"{"measures": [{"subdivisions": 1, "pattern": [3]}]}"#,
        r#"{"tempo": 120, "measures": [{"subdivisions": 1, "pattern": [1]}, {"subdivisions": 0, "pattern": []}]}"#,
    ] {
        assert!(parse(bad).is_err(), "accepted {}", bad);
    }
}

#[test]
fn malformed_json_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ tempo: ").expect("write");
    let err = open(&path).expect_err("should fail");
    assert!(format!("{:#}", err).contains("parsing"));
}
