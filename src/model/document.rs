use serde::{Deserialize, Deserializer, Serialize};

use super::measure::Measure;
use super::sequence::Sequence;
use super::tempo::Tempo;

/// The saved/exported shape of a session: `{ "tempo": 120, "measures": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "lenient_tempo")]
    pub tempo: Tempo,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub measures: Sequence,
}

impl Document {
    /// What a fresh session opens with: default tempo and one default measure.
    pub fn starter() -> Self {
        Self { tempo: Tempo::default(), measures: Sequence::new(vec![Measure::default()]) }
    }

    pub fn list(&self) -> String {
        if self.measures.is_empty() {
            return "[no measures]".to_string();
        }
        let mut out = String::new();
        for (i, m) in self.measures.iter().enumerate() {
            out.push_str(&format!(
                "{:>2} Measure {} ({})  {}\n",
                i + 1,
                i + 1,
                m.subdivisions(),
                m.pattern_glyphs()
            ));
        }
        out
    }
}

// 0 or null falls back to the default, anything else is pulled into range.
fn lenient_tempo<'de, D>(deserializer: D) -> Result<Tempo, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<i64> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(0) => Tempo::default(),
        Some(bpm) => Tempo::clamped(bpm),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Sequence, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Sequence> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}
