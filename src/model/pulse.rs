use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How a single pulse sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PulseState {
    Silent,
    #[default]
    Accent,
    Strong,
}

impl PulseState {
    /// Rotation order used when a pulse is clicked in the editor.
    pub const CYCLE: [PulseState; 3] = [PulseState::Silent, PulseState::Accent, PulseState::Strong];

    pub fn ordinal(self) -> u8 {
        match self {
            PulseState::Silent => 0,
            PulseState::Accent => 1,
            PulseState::Strong => 2,
        }
    }

    pub fn rotate(self) -> Self {
        let at = Self::CYCLE.iter().position(|s| *s == self).unwrap_or(0);
        Self::CYCLE[(at + 1) % Self::CYCLE.len()]
    }

    pub fn is_audible(self) -> bool {
        !matches!(self, PulseState::Silent)
    }

    /// Single-character glyph for terminal display.
    pub fn glyph(self) -> char {
        match self {
            PulseState::Silent => '·',
            PulseState::Accent => '○',
            PulseState::Strong => '●',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PulseState::Silent => "silent",
            PulseState::Accent => "accent",
            PulseState::Strong => "strong",
        }
    }
}

impl TryFrom<u8> for PulseState {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::CYCLE
            .iter()
            .copied()
            .find(|s| s.ordinal() == value)
            .ok_or(ValidationError::InvalidPulseState(value as i64))
    }
}

impl From<PulseState> for u8 {
    fn from(state: PulseState) -> Self {
        state.ordinal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_cycles_through_all_states() {
        assert_eq!(PulseState::Silent.rotate(), PulseState::Accent);
        assert_eq!(PulseState::Accent.rotate(), PulseState::Strong);
        assert_eq!(PulseState::Strong.rotate(), PulseState::Silent);
    }

    #[test]
    fn ordinals_match_stored_values() {
        for (i, s) in PulseState::CYCLE.iter().enumerate() {
            assert_eq!(s.ordinal() as usize, i);
            assert_eq!(PulseState::try_from(i as u8), Ok(*s));
        }
        assert_eq!(
            PulseState::try_from(3),
            Err(ValidationError::InvalidPulseState(3))
        );
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&[PulseState::Strong, PulseState::Silent]).unwrap();
        assert_eq!(json, "[2,0]");
        let back: Vec<PulseState> = serde_json::from_str("[1,2,0]").unwrap();
        assert_eq!(back, vec![PulseState::Accent, PulseState::Strong, PulseState::Silent]);
        assert!(serde_json::from_str::<PulseState>("7").is_err());
    }
}
