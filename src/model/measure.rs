use serde::{Deserialize, Serialize};

use super::pulse::PulseState;
use crate::error::ValidationError;

pub const MIN_SUBDIVISIONS: usize = 1;
pub const MAX_SUBDIVISIONS: usize = 16;

/// One bar of the sequence: a subdivision count and one state per pulse.
///
/// The pattern always holds exactly `subdivisions` entries; the fields are
/// private so every path in goes through a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMeasure")]
pub struct Measure {
    subdivisions: usize,
    pattern: Vec<PulseState>,
}

#[derive(Deserialize)]
struct RawMeasure {
    subdivisions: i64,
    pattern: Vec<PulseState>,
}

impl TryFrom<RawMeasure> for Measure {
    type Error = ValidationError;

    fn try_from(raw: RawMeasure) -> Result<Self, Self::Error> {
        let subdivisions = check_subdivisions(raw.subdivisions)?;
        Measure::from_pattern_checked(subdivisions, raw.pattern)
    }
}

impl Default for Measure {
    fn default() -> Self {
        Self {
            subdivisions: 4,
            pattern: vec![
                PulseState::Strong,
                PulseState::Accent,
                PulseState::Accent,
                PulseState::Accent,
            ],
        }
    }
}

fn check_subdivisions(n: i64) -> Result<usize, ValidationError> {
    if n < MIN_SUBDIVISIONS as i64 || n > MAX_SUBDIVISIONS as i64 {
        return Err(ValidationError::SubdivisionsOutOfRange(n));
    }
    Ok(n as usize)
}

impl Measure {
    /// A measure of `subdivisions` accented pulses.
    pub fn new(subdivisions: i64) -> Result<Self, ValidationError> {
        let subdivisions = check_subdivisions(subdivisions)?;
        Ok(Self { subdivisions, pattern: vec![PulseState::Accent; subdivisions] })
    }

    pub fn from_pattern(pattern: Vec<PulseState>) -> Result<Self, ValidationError> {
        let subdivisions = check_subdivisions(pattern.len() as i64)?;
        Self::from_pattern_checked(subdivisions, pattern)
    }

    fn from_pattern_checked(
        subdivisions: usize,
        pattern: Vec<PulseState>,
    ) -> Result<Self, ValidationError> {
        if pattern.len() != subdivisions {
            return Err(ValidationError::PatternLength { subdivisions, pattern: pattern.len() });
        }
        Ok(Self { subdivisions, pattern })
    }

    pub fn subdivisions(&self) -> usize {
        self.subdivisions
    }

    pub fn pattern(&self) -> &[PulseState] {
        &self.pattern
    }

    pub fn pulse(&self, index: usize) -> Option<PulseState> {
        self.pattern.get(index).copied()
    }

    /// Resize to `subdivisions`, padding the tail with `Accent` or truncating it.
    pub fn set_subdivisions(&mut self, subdivisions: i64) -> Result<(), ValidationError> {
        let n = check_subdivisions(subdivisions)?;
        self.pattern.resize(n, PulseState::Accent);
        self.subdivisions = n;
        Ok(())
    }

    /// Advance one pulse to the next state in the rotation; returns the new state.
    pub fn rotate_pulse(&mut self, index: usize) -> Result<PulseState, ValidationError> {
        let subdivisions = self.subdivisions;
        let slot = self
            .pattern
            .get_mut(index)
            .ok_or(ValidationError::NoSuchPulse { index, subdivisions })?;
        *slot = slot.rotate();
        Ok(*slot)
    }

    /// Pattern rendered with one glyph per pulse.
    pub fn pattern_glyphs(&self) -> String {
        self.pattern.iter().map(|s| s.glyph()).collect()
    }
}
