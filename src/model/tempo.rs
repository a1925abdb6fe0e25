use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Beats per minute, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct Tempo(u16);

impl Tempo {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 300;

    pub fn new(bpm: i64) -> Result<Self, ValidationError> {
        if bpm < Self::MIN as i64 || bpm > Self::MAX as i64 {
            return Err(ValidationError::TempoOutOfRange(bpm));
        }
        Ok(Self(bpm as u16))
    }

    pub fn clamped(bpm: i64) -> Self {
        Self(bpm.clamp(Self::MIN as i64, Self::MAX as i64) as u16)
    }

    pub fn bpm(self) -> u16 {
        self.0
    }

    pub fn beat_duration(self) -> f64 {
        60.0 / self.0 as f64
    }

    /// Seconds per pulse when a beat is split into `subdivisions`.
    pub fn pulse_duration(self, subdivisions: usize) -> f64 {
        self.beat_duration() / subdivisions as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120)
    }
}

impl TryFrom<i64> for Tempo {
    type Error = ValidationError;

    fn try_from(bpm: i64) -> Result<Self, Self::Error> {
        Tempo::new(bpm)
    }
}

impl From<Tempo> for u16 {
    fn from(t: Tempo) -> Self {
        t.0
    }
}

impl std::fmt::Display for Tempo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bpm", self.0)
    }
}
