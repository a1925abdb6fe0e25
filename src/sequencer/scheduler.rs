//! Look-ahead scheduling.
//!
//! The tick runs on a coarse wall-clock timer but decides what to schedule
//! against the audio clock: every pulse whose time falls inside
//! `[.., now + horizon)` is emitted and consumed, later pulses wait for a
//! later tick.

use super::transport::{Position, Transport};
use crate::error::{Error, Result};
use crate::model::measure::MAX_SUBDIVISIONS;
use crate::model::{PulseState, Sequence, Tempo};

/// A pulse handed to the visual side: where the playhead should be at `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualCue {
    pub measure: usize,
    pub pulse: usize,
    pub time: f64,
}

/// Receives the two event streams of a tick.
pub trait PulseSink {
    /// An audible pulse at audio time `time`.
    fn audio(&mut self, time: f64, state: PulseState);
    /// Every pulse, audible or not.
    fn visual(&mut self, cue: VisualCue);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scheduler {
    horizon: f64,
    max_pulses: usize,
}

impl Scheduler {
    pub fn new(horizon: f64) -> Self {
        let shortest = Tempo::clamped(Tempo::MAX as i64).pulse_duration(MAX_SUBDIVISIONS);
        let max_pulses = (2.0 * horizon / shortest).ceil() as usize + 1;
        Self { horizon, max_pulses }
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Upper bound on pulses one tick may process.
    pub fn max_pulses_per_tick(&self) -> usize {
        self.max_pulses
    }

    /// Emits and consumes every pulse due before `now + horizon`.
    ///
    /// Returns how many pulses were consumed. Does nothing unless the
    /// transport is playing and the sequence has measures.
    pub fn tick(
        &self,
        transport: &mut Transport,
        sequence: &Sequence,
        now: f64,
        sink: &mut impl PulseSink,
    ) -> Result<usize> {
        if !transport.is_playing() {
            return Ok(0);
        }
        let limit = now + self.horizon;
        let mut consumed = 0;
        while transport.next_event_time() < limit {
            if sequence.is_empty() {
                return Ok(consumed);
            }
            if consumed >= self.max_pulses {
                return Err(Error::InternalConsistency(format!(
                    "tick exceeded {} pulses; cursor at {:.3}s, clock at {:.3}s",
                    self.max_pulses,
                    transport.next_event_time(),
                    now
                )));
            }
            let Position { measure: mi, pulse: pi } = transport.position();
            let measure = sequence.get(mi).ok_or_else(|| {
                Error::InternalConsistency(format!(
                    "position measure {} outside sequence of {}",
                    mi,
                    sequence.len()
                ))
            })?;
            let subdivisions = measure.subdivisions();
            if subdivisions == 0 || measure.pattern().len() != subdivisions {
                return Err(Error::InternalConsistency(format!(
                    "measure {} has {} subdivisions and {} pulses",
                    mi,
                    subdivisions,
                    measure.pattern().len()
                )));
            }
            let state = measure.pulse(pi).ok_or_else(|| {
                Error::InternalConsistency(format!(
                    "position pulse {} outside measure {} of {}",
                    pi, mi, subdivisions
                ))
            })?;

            let time = transport.next_event_time();
            if state.is_audible() {
                sink.audio(time, state);
            }
            sink.visual(VisualCue { measure: mi, pulse: pi, time });

            let pulse_duration = transport.tempo().pulse_duration(subdivisions);
            transport.advance(pulse_duration, subdivisions, sequence.len());
            consumed += 1;
        }
        Ok(consumed)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(0.1)
    }
}
