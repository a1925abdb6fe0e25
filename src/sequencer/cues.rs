//! Deferred playhead updates.
//!
//! The scheduler runs ahead of the audio clock, so a visual cue has to wait
//! until its pulse is actually heard. Cues are kept here with a wall-clock
//! deadline and fired by the engine loop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::scheduler::VisualCue;

/// What the live view highlights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Playhead {
    pub measure: Option<usize>,
    /// Only set while the active measure is open in the editor.
    pub pulse: Option<usize>,
}

impl Playhead {
    pub fn clear(&mut self) {
        *self = Playhead::default();
    }
}

pub type SharedPlayhead = Arc<Mutex<Playhead>>;

#[derive(Debug, Clone, Copy)]
struct PendingCue {
    due: Instant,
    cue: VisualCue,
}

#[derive(Debug, Default)]
pub struct CueRegistry {
    pending: Vec<PendingCue>,
}

impl CueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `cue` to fire when the audio clock reaches `cue.time`.
    ///
    /// Cues already in the past are due immediately.
    pub fn dispatch(&mut self, cue: VisualCue, audio_now: f64, wall_now: Instant) -> Instant {
        let delay = (cue.time - audio_now).max(0.0);
        let due = wall_now + Duration::from_secs_f64(delay);
        self.pending.push(PendingCue { due, cue });
        due
    }

    /// Applies every cue due at `wall_now`, in time order. Returns how many fired.
    pub fn fire_due(
        &mut self,
        wall_now: Instant,
        editing: Option<usize>,
        playhead: &mut Playhead,
    ) -> usize {
        let mut due: Vec<PendingCue> = Vec::new();
        self.pending.retain(|p| {
            if p.due <= wall_now {
                due.push(*p);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.cue.time.total_cmp(&b.cue.time));
        for p in &due {
            playhead.measure = Some(p.cue.measure);
            playhead.pulse = (editing == Some(p.cue.measure)).then_some(p.cue.pulse);
        }
        due.len()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
