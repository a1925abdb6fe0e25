use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::Document;

/// Writes `document` as pretty-printed JSON.
pub fn save(document: &Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut data = serde_json::to_string_pretty(document).context("encoding document")?;
    data.push('\n');
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

pub fn open(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Decodes a document, filling in defaults for missing fields.
pub fn parse(data: &str) -> Result<Document> {
    Ok(serde_json::from_str(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Measure, PulseState, Sequence, Tempo};

    #[test]
    fn missing_fields_take_defaults() {
        let doc = parse("{}").unwrap();
        assert_eq!(doc.tempo, Tempo::default());
        assert!(doc.measures.is_empty());
    }

    #[test]
    fn bad_measures_are_rejected_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"tempo": 100, "measures": [{"subdivisions": 3, "pattern": [1, 1]}]}"#).unwrap();
        let err = open(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.json"));
    }

    #[test]
    fn saved_file_is_pretty_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groove.json");
        let doc = Document {
            tempo: Tempo::new(96).unwrap(),
            measures: Sequence::new(vec![
                Measure::from_pattern(vec![
                    PulseState::Strong,
                    PulseState::Silent,
                    PulseState::Accent,
                ])
                .unwrap(),
            ]),
        };
        save(&doc, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"tempo\": 96"));
        assert_eq!(open(&path).unwrap(), doc);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = open("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("not/here.json"));
    }
}
