use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::{Sequence, SequenceEdit, Tempo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportStatus::Stopped => "stopped",
            TransportStatus::Playing => "playing",
            TransportStatus::Paused => "paused",
        }
    }
}

/// Playback position: the next pulse the scheduler will consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub measure: usize,
    pub pulse: usize,
}

impl Position {
    pub fn new(measure: usize, pulse: usize) -> Self {
        Self { measure, pulse }
    }
}

/// Which measure playback starts from after a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    #[default]
    First,
    /// Start on the last measure whenever there is more than one.
    Last,
}

impl StartPolicy {
    pub fn start_measure(self, measures: usize) -> usize {
        match self {
            StartPolicy::First => 0,
            StartPolicy::Last => measures.saturating_sub(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StartPolicy::First => "first",
            StartPolicy::Last => "last",
        }
    }
}

impl FromStr for StartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(StartPolicy::First),
            "last" => Ok(StartPolicy::Last),
            other => Err(format!("start policy must be first or last, got '{}'", other)),
        }
    }
}

/// Tempo, play state and the scheduling cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    tempo: Tempo,
    status: TransportStatus,
    position: Position,
    next_event_time: f64,
    lead_in: f64,
    start_policy: StartPolicy,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(Tempo::default(), 0.1, StartPolicy::default())
    }
}

impl Transport {
    pub fn new(tempo: Tempo, lead_in: f64, start_policy: StartPolicy) -> Self {
        Self {
            tempo,
            status: TransportStatus::Stopped,
            position: Position::default(),
            next_event_time: 0.0,
            lead_in,
            start_policy,
        }
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == TransportStatus::Playing
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    pub fn start_policy(&self) -> StartPolicy {
        self.start_policy
    }

    /// Starts or resumes playback anchored at `now + lead_in` on the audio clock.
    ///
    /// Returns `Ok(false)` if already playing. An empty sequence is rejected
    /// and nothing changes.
    pub fn play(&mut self, sequence: &Sequence, now: f64) -> Result<bool, ValidationError> {
        if sequence.is_empty() {
            return Err(ValidationError::EmptySequence);
        }
        match self.status {
            TransportStatus::Playing => return Ok(false),
            TransportStatus::Stopped => {
                self.position = Position::new(self.start_policy.start_measure(sequence.len()), 0);
            }
            TransportStatus::Paused => self.clamp_position(sequence),
        }
        self.next_event_time = now + self.lead_in;
        self.status = TransportStatus::Playing;
        Ok(true)
    }

    /// Halts playback keeping the position. Returns whether anything changed.
    pub fn pause(&mut self) -> bool {
        if self.status != TransportStatus::Playing {
            return false;
        }
        self.status = TransportStatus::Paused;
        true
    }

    pub fn stop(&mut self) {
        self.status = TransportStatus::Stopped;
        self.position = Position::default();
    }

    /// Clamps `bpm` into range; pulses already scheduled keep their times.
    pub fn set_tempo(&mut self, bpm: i64) -> Tempo {
        self.tempo = Tempo::clamped(bpm);
        self.tempo
    }

    pub(crate) fn replace_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    /// Moves the cursor back in step with the clock after a stalled tick loop.
    pub(crate) fn reanchor(&mut self, now: f64) {
        self.next_event_time = now + self.lead_in;
    }

    /// Consumes the current pulse.
    pub(crate) fn advance(&mut self, pulse_duration: f64, subdivisions: usize, measures: usize) {
        self.next_event_time += pulse_duration;
        self.position.pulse += 1;
        if self.position.pulse >= subdivisions {
            self.position.pulse = 0;
            self.position.measure = (self.position.measure + 1) % measures;
        }
    }

    /// Keeps the position pointing at a real pulse after the sequence changed.
    pub fn sequence_mutated(&mut self, sequence: &Sequence, edit: SequenceEdit) {
        if sequence.is_empty() {
            self.position = Position::default();
            if self.status != TransportStatus::Stopped {
                self.status = TransportStatus::Stopped;
            }
            return;
        }
        match edit {
            SequenceEdit::Removed(i) if i < self.position.measure => self.position.measure -= 1,
            SequenceEdit::Removed(i) if i == self.position.measure => {
                self.position = Position::new(i % sequence.len(), 0);
            }
            SequenceEdit::Replaced => self.position = Position::default(),
            _ => {}
        }
        self.clamp_position(sequence);
    }

    fn clamp_position(&mut self, sequence: &Sequence) {
        let last = sequence.len().saturating_sub(1);
        self.position.measure = self.position.measure.min(last);
        if let Some(m) = sequence.get(self.position.measure) {
            self.position.pulse = self.position.pulse.min(m.subdivisions().saturating_sub(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Measure;

    fn seq(subs: &[i64]) -> Sequence {
        Sequence::new(subs.iter().map(|n| Measure::new(*n).unwrap()).collect())
    }

    #[test]
    fn play_on_empty_sequence_is_rejected() {
        let mut t = Transport::default();
        assert_eq!(t.play(&Sequence::default(), 1.0), Err(ValidationError::EmptySequence));
        assert!(!t.is_playing());
        assert_eq!(t.status(), TransportStatus::Stopped);
    }

    #[test]
    fn play_anchors_after_lead_in() {
        let mut t = Transport::default();
        assert_eq!(t.play(&seq(&[4]), 2.0), Ok(true));
        assert!(t.is_playing());
        assert!((t.next_event_time() - 2.1).abs() < 1e-12);
        assert_eq!(t.play(&seq(&[4]), 5.0), Ok(false));
        assert!((t.next_event_time() - 2.1).abs() < 1e-12);
    }

    #[test]
    fn start_policy_picks_first_or_last_measure() {
        let s = seq(&[4, 3, 2]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        assert_eq!(t.position(), Position::new(0, 0));

        let mut t = Transport::new(Tempo::default(), 0.1, StartPolicy::Last);
        t.play(&s, 0.0).unwrap();
        assert_eq!(t.position(), Position::new(2, 0));

        let mut t = Transport::new(Tempo::default(), 0.1, StartPolicy::Last);
        t.play(&seq(&[4]), 0.0).unwrap();
        assert_eq!(t.position(), Position::new(0, 0));
    }

    #[test]
    fn pause_keeps_position_and_resume_reanchors() {
        let s = seq(&[4, 4]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        t.advance(0.125, 4, 2);
        t.advance(0.125, 4, 2);
        let before = t.position();
        assert!(t.pause());
        assert_eq!(t.status(), TransportStatus::Paused);
        assert_eq!(t.position(), before);
        assert!(!t.pause());

        t.play(&s, 10.0).unwrap();
        assert_eq!(t.position(), before);
        assert!((t.next_event_time() - 10.1).abs() < 1e-12);
    }

    #[test]
    fn stop_resets_position() {
        let s = seq(&[2, 2]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        t.advance(0.25, 2, 2);
        t.advance(0.25, 2, 2);
        t.advance(0.25, 2, 2);
        assert_eq!(t.position(), Position::new(1, 1));
        t.stop();
        assert_eq!(t.position(), Position::new(0, 0));
        assert!(!t.is_playing());
    }

    #[test]
    fn set_tempo_clamps() {
        let mut t = Transport::default();
        assert_eq!(t.set_tempo(0).bpm(), 1);
        assert_eq!(t.set_tempo(1000).bpm(), 300);
        assert_eq!(t.set_tempo(96).bpm(), 96);
    }

    #[test]
    fn removing_earlier_measure_shifts_position_down() {
        let mut s = seq(&[4, 4, 4]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        for _ in 0..9 {
            t.advance(0.1, 4, 3);
        }
        assert_eq!(t.position(), Position::new(2, 1));
        let (_, edit) = s.remove(0).unwrap();
        t.sequence_mutated(&s, edit);
        assert_eq!(t.position(), Position::new(1, 1));
    }

    #[test]
    fn removing_current_measure_moves_to_the_next_one() {
        let mut s = seq(&[4, 4, 4]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        for _ in 0..6 {
            t.advance(0.1, 4, 3);
        }
        assert_eq!(t.position(), Position::new(1, 2));
        let (_, edit) = s.remove(1).unwrap();
        t.sequence_mutated(&s, edit);
        assert_eq!(t.position(), Position::new(1, 0));
        assert_eq!(s.len(), 2);
        assert!(t.is_playing());
    }

    #[test]
    fn removing_current_last_measure_wraps_to_first() {
        let mut s = seq(&[4, 4]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        for _ in 0..6 {
            t.advance(0.1, 4, 2);
        }
        let (_, edit) = s.remove(1).unwrap();
        t.sequence_mutated(&s, edit);
        assert_eq!(t.position(), Position::new(0, 0));
        assert!(t.is_playing());
    }

    #[test]
    fn shrinking_current_measure_clamps_pulse() {
        let mut s = seq(&[8]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        for _ in 0..6 {
            t.advance(0.1, 8, 1);
        }
        let edit = s.set_subdivisions(0, 3).unwrap();
        t.sequence_mutated(&s, edit);
        assert_eq!(t.position(), Position::new(0, 2));
    }

    #[test]
    fn emptying_the_sequence_stops_playback() {
        let mut s = seq(&[4]);
        let mut t = Transport::default();
        t.play(&s, 0.0).unwrap();
        let (_, edit) = s.remove(0).unwrap();
        t.sequence_mutated(&s, edit);
        assert_eq!(t.status(), TransportStatus::Stopped);
        assert_eq!(t.position(), Position::default());
    }

    #[test]
    fn start_policy_parses_from_text() {
        assert_eq!("Last".parse::<StartPolicy>(), Ok(StartPolicy::Last));
        assert_eq!(" first ".parse::<StartPolicy>(), Ok(StartPolicy::First));
        assert!("middle".parse::<StartPolicy>().is_err());
    }
}
