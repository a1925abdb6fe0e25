use thiserror::Error;

/// Rejected at the command boundary; nothing was mutated.
///
/// Indexes are stored 0-based and displayed 1-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("add at least one measure before playing")]
    EmptySequence,
    #[error("tempo {0} is outside 1..=300 bpm")]
    TempoOutOfRange(i64),
    #[error("subdivisions {0} is outside 1..=16")]
    SubdivisionsOutOfRange(i64),
    #[error("no measure {} (sequence has {})", .index + 1, .len)]
    NoSuchMeasure { index: usize, len: usize },
    #[error("no pulse {} (measure has {})", .index + 1, .subdivisions)]
    NoSuchPulse { index: usize, subdivisions: usize },
    #[error("pulse state {0} is not 0, 1 or 2")]
    InvalidPulseState(i64),
    #[error("pattern has {pattern} pulses but subdivisions is {subdivisions}")]
    PatternLength { subdivisions: usize, pattern: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Broken model invariant. Fatal to the current playback.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
