//! The single owner of playback and pattern state.
//!
//! Every command, scheduling tick and cue runs through one `Session` on one
//! thread, so none of its state needs locking. The playhead is the exception:
//! it is shared so a viewer on another thread can read it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::cues::{CueRegistry, Playhead, SharedPlayhead};
use super::scheduler::{PulseSink, Scheduler, VisualCue};
use super::ticker::Ticker;
use super::transport::{Transport, TransportStatus};
use crate::audio::{AudioClock, AudioEmitter};
use crate::config::EngineConfig;
use crate::console;
use crate::error::{Result, ValidationError};
use crate::model::{Document, Measure, PulseState, Sequence, SequenceEdit, Tempo};

pub struct Session<C: AudioClock> {
    sequence: Sequence,
    transport: Transport,
    scheduler: Scheduler,
    emitter: AudioEmitter,
    ticker: Ticker,
    cues: CueRegistry,
    playhead: SharedPlayhead,
    editing: Option<usize>,
    clock: C,
}

impl<C: AudioClock> Session<C> {
    /// A session holding the starter document.
    pub fn new(config: &EngineConfig, clock: C) -> Self {
        Self::with_document(config, clock, Document::starter())
    }

    pub fn with_document(config: &EngineConfig, clock: C, document: Document) -> Self {
        Self {
            sequence: document.measures,
            transport: Transport::new(document.tempo, config.lead_in, config.start_policy),
            scheduler: Scheduler::new(config.horizon),
            emitter: AudioEmitter::from_config(config),
            ticker: Ticker::new(config.tick_period),
            cues: CueRegistry::new(),
            playhead: Arc::new(Mutex::new(Playhead::default())),
            editing: None,
            clock,
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn status(&self) -> TransportStatus {
        self.transport.status()
    }

    pub fn tempo(&self) -> Tempo {
        self.transport.tempo()
    }

    /// The measure open in the editor, if any.
    pub fn editing(&self) -> Option<usize> {
        self.editing
    }

    pub fn playhead(&self) -> SharedPlayhead {
        Arc::clone(&self.playhead)
    }

    pub fn pending_cues(&self) -> usize {
        self.cues.len()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Snapshot for saving.
    pub fn document(&self) -> Document {
        Document { tempo: self.transport.tempo(), measures: self.sequence.clone() }
    }

    /// Starts or resumes playback and runs the first tick straight away.
    ///
    /// Returns `Ok(false)` if already playing.
    pub fn play(&mut self, wall: Instant) -> Result<bool> {
        let started = self.transport.play(&self.sequence, self.clock.now())?;
        if started {
            self.ticker.start(wall);
            self.run_due(wall)?;
        }
        Ok(started)
    }

    pub fn pause(&mut self) -> bool {
        self.halt();
        self.transport.pause()
    }

    pub fn stop(&mut self) {
        self.halt();
        self.transport.stop();
        self.lock_playhead().clear();
    }

    /// Play when not playing, pause when playing.
    pub fn toggle(&mut self, wall: Instant) -> Result<TransportStatus> {
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play(wall)?;
        }
        Ok(self.transport.status())
    }

    pub fn set_tempo(&mut self, bpm: i64) -> Tempo {
        self.transport.set_tempo(bpm)
    }

    /// Appends a default measure and returns its index.
    pub fn add_measure(&mut self) -> usize {
        let edit = self.sequence.add_default();
        self.after_edit(edit);
        self.sequence.len() - 1
    }

    pub fn remove_measure(&mut self, index: usize) -> Result<Measure> {
        let (removed, edit) = self.sequence.remove(index)?;
        self.editing = match self.editing {
            Some(e) if e == index => None,
            Some(e) if e > index => Some(e - 1),
            other => other,
        };
        self.after_edit(edit);
        Ok(removed)
    }

    pub fn set_subdivisions(&mut self, index: usize, subdivisions: i64) -> Result<()> {
        let edit = self.sequence.set_subdivisions(index, subdivisions)?;
        self.after_edit(edit);
        Ok(())
    }

    /// Cycles one pulse and returns its new state.
    pub fn rotate_pulse(&mut self, index: usize, pulse: usize) -> Result<PulseState> {
        let (state, edit) = self.sequence.rotate_pulse(index, pulse)?;
        self.after_edit(edit);
        Ok(state)
    }

    pub fn measure(&self, index: usize) -> Result<&Measure> {
        let len = self.sequence.len();
        Ok(self
            .sequence
            .get(index)
            .ok_or(ValidationError::NoSuchMeasure { index, len })?)
    }

    pub fn open_editor(&mut self, index: usize) -> Result<&Measure> {
        let len = self.sequence.len();
        let measure = self
            .sequence
            .get(index)
            .ok_or(ValidationError::NoSuchMeasure { index, len })?;
        self.editing = Some(index);
        Ok(measure)
    }

    pub fn close_editor(&mut self) {
        self.editing = None;
    }

    /// Replaces tempo and measures wholesale. Playback stops.
    pub fn load(&mut self, document: Document) {
        self.stop();
        self.editing = None;
        self.sequence = document.measures;
        self.transport.replace_tempo(document.tempo);
        self.transport.sequence_mutated(&self.sequence, SequenceEdit::Replaced);
    }

    /// Fires due cues and runs the tick if it is due.
    ///
    /// Returns the number of pulses scheduled. A consistency failure stops
    /// playback before it is returned.
    pub fn run_due(&mut self, wall: Instant) -> Result<usize> {
        let mut scheduled = 0;
        if self.ticker.poll(wall) {
            scheduled = self.tick(wall)?;
        }
        let mut playhead = self.playhead.lock().unwrap_or_else(|e| e.into_inner());
        self.cues.fire_due(wall, self.editing, &mut playhead);
        Ok(scheduled)
    }

    /// One scheduling pass against the current audio time.
    pub fn tick(&mut self, wall: Instant) -> Result<usize> {
        let audio_now = self.clock.now();
        if self.transport.is_playing()
            && self.transport.next_event_time() < audio_now - self.scheduler.horizon()
        {
            console::warn(format!(
                "scheduler fell {:.0} ms behind; resyncing",
                (audio_now - self.transport.next_event_time()) * 1000.0
            ));
            self.transport.reanchor(audio_now);
        }

        let mut sink = SessionSink {
            emitter: &self.emitter,
            clock: &mut self.clock,
            cues: &mut self.cues,
            audio_now,
            wall,
        };
        match self.scheduler.tick(&mut self.transport, &self.sequence, audio_now, &mut sink) {
            Ok(n) => Ok(n),
            Err(e) => {
                console::error(format!("playback stopped: {}", e));
                self.stop();
                Err(e)
            }
        }
    }

    /// The earliest instant at which [`Session::run_due`] has work.
    pub fn next_wakeup(&self) -> Option<Instant> {
        match (self.ticker.next_due(), self.cues.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn halt(&mut self) {
        self.ticker.cancel();
        self.cues.cancel_all();
    }

    fn after_edit(&mut self, edit: SequenceEdit) {
        let was_running = self.transport.status() != TransportStatus::Stopped;
        self.transport.sequence_mutated(&self.sequence, edit);
        if was_running && self.transport.status() == TransportStatus::Stopped {
            console::warn("sequence is empty; playback stopped");
            self.halt();
            self.lock_playhead().clear();
        }
    }

    fn lock_playhead(&self) -> MutexGuard<'_, Playhead> {
        self.playhead.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Routes scheduler output to the audio clock and the cue registry.
struct SessionSink<'a, C: AudioClock> {
    emitter: &'a AudioEmitter,
    clock: &'a mut C,
    cues: &'a mut CueRegistry,
    audio_now: f64,
    wall: Instant,
}

impl<C: AudioClock> PulseSink for SessionSink<'_, C> {
    fn audio(&mut self, time: f64, state: PulseState) {
        self.emitter.emit(&mut *self.clock, time, state);
    }

    fn visual(&mut self, cue: VisualCue) {
        self.cues.dispatch(cue, self.audio_now, self.wall);
    }
}
