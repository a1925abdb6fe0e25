//! Background thread that owns the session.
//!
//! Commands arrive over a channel and are answered on a per-request reply
//! channel. Between commands the thread sleeps until the session's next tick
//! or cue deadline. Every accepted edit is autosaved when a session file is
//! configured.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};

use crate::audio::AudioClock;
use crate::config::EngineConfig;
use crate::console;
use crate::error::Error;
use crate::model::{Document, Measure, PulseState, Tempo};
use crate::sequencer::{Playhead, Position, Session, SharedPlayhead, TransportStatus};
use crate::storage::state;

/// Everything a front end needs to render the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub document: Document,
    pub status: TransportStatus,
    pub position: Position,
    pub editing: Option<usize>,
}

#[derive(Debug, Clone)]
enum Command {
    Play,
    Pause,
    Toggle,
    Stop,
    SetTempo(i64),
    AddMeasure,
    RemoveMeasure(usize),
    SetSubdivisions { measure: usize, subdivisions: i64 },
    RotatePulse { measure: usize, pulse: usize },
    OpenEditor(usize),
    CloseEditor,
    Load(Document),
    Snapshot,
}

impl Command {
    /// True for commands that change tempo or measures.
    fn edits_document(&self) -> bool {
        matches!(
            self,
            Command::SetTempo(_)
                | Command::AddMeasure
                | Command::RemoveMeasure(_)
                | Command::SetSubdivisions { .. }
                | Command::RotatePulse { .. }
                | Command::Load(_)
        )
    }
}

#[derive(Debug)]
enum Outcome {
    Done,
    Changed(bool),
    Status(TransportStatus),
    Tempo(Tempo),
    Index(usize),
    Measure(Measure),
    Pulse(PulseState),
    Snapshot(Snapshot),
}

enum ControlMsg {
    Request { command: Command, reply: Sender<Result<Outcome, Error>> },
    Shutdown,
}

/// Cheap, cloneable access to a running engine.
#[derive(Clone)]
pub struct EngineClient {
    tx: Sender<ControlMsg>,
    playhead: SharedPlayhead,
}

/// Owns the engine thread; dropping it shuts the engine down.
pub struct EngineHandle {
    client: EngineClient,
    thread: Option<JoinHandle<()>>,
}

/// Starts the engine thread with `document` loaded.
///
/// `clock` runs on the engine thread, so audio devices that cannot move
/// between threads are opened there.
pub fn spawn<C, F>(config: EngineConfig, document: Document, clock: F) -> Result<EngineHandle>
where
    C: AudioClock + 'static,
    F: FnOnce() -> C + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<ControlMsg>();
    let (ready_tx, ready_rx) = mpsc::channel::<SharedPlayhead>();

    let thread = thread::Builder::new()
        .name("rhythm-engine".into())
        .spawn(move || {
            let mut session = Session::with_document(&config, clock(), document);
            if ready_tx.send(session.playhead()).is_err() {
                return;
            }
            loop {
                let msg = match session.next_wakeup() {
                    Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match msg {
                    Ok(ControlMsg::Request { command, reply }) => {
                        let edits = command.edits_document();
                        let result = apply(&mut session, command);
                        if let (true, Ok(_), Some(path)) = (edits, &result, &config.state_path) {
                            autosave(&session, path);
                        }
                        let _ = reply.send(result);
                    }
                    Ok(ControlMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                // Tick failures stop playback and are logged by the session.
                let _ = session.run_due(Instant::now());
            }
            session.stop();
        })
        .context("spawning engine thread")?;

    let playhead = ready_rx
        .recv()
        .map_err(|_| anyhow!("engine thread exited during startup"))?;
    Ok(EngineHandle { client: EngineClient { tx, playhead }, thread: Some(thread) })
}

fn apply<C: AudioClock>(session: &mut Session<C>, command: Command) -> Result<Outcome, Error> {
    let now = Instant::now();
    Ok(match command {
        Command::Play => Outcome::Changed(session.play(now)?),
        Command::Pause => Outcome::Changed(session.pause()),
        Command::Toggle => Outcome::Status(session.toggle(now)?),
        Command::Stop => {
            session.stop();
            Outcome::Status(session.status())
        }
        Command::SetTempo(bpm) => Outcome::Tempo(session.set_tempo(bpm)),
        Command::AddMeasure => Outcome::Index(session.add_measure()),
        Command::RemoveMeasure(i) => Outcome::Measure(session.remove_measure(i)?),
        Command::SetSubdivisions { measure, subdivisions } => {
            session.set_subdivisions(measure, subdivisions)?;
            Outcome::Measure(session.measure(measure)?.clone())
        }
        Command::RotatePulse { measure, pulse } => {
            Outcome::Pulse(session.rotate_pulse(measure, pulse)?)
        }
        Command::OpenEditor(i) => Outcome::Measure(session.open_editor(i)?.clone()),
        Command::CloseEditor => {
            session.close_editor();
            Outcome::Done
        }
        Command::Load(document) => {
            session.load(document);
            Outcome::Done
        }
        Command::Snapshot => Outcome::Snapshot(Snapshot {
            document: session.document(),
            status: session.status(),
            position: session.transport().position(),
            editing: session.editing(),
        }),
    })
}

fn autosave<C: AudioClock>(session: &Session<C>, path: &Path) {
    if let Err(e) = state::persist(&session.document(), path) {
        console::warn(format!("autosave failed: {:#}", e));
    }
}

impl EngineClient {
    fn request(&self, command: Command) -> Result<Outcome> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(ControlMsg::Request { command, reply: reply_tx })
            .map_err(|_| anyhow!("engine is not running"))?;
        let outcome = reply_rx.recv().map_err(|_| anyhow!("engine stopped before replying"))??;
        Ok(outcome)
    }

    /// Returns false if playback was already running.
    pub fn play(&self) -> Result<bool> {
        match self.request(Command::Play)? {
            Outcome::Changed(started) => Ok(started),
            other => unexpected(other),
        }
    }

    pub fn pause(&self) -> Result<bool> {
        match self.request(Command::Pause)? {
            Outcome::Changed(paused) => Ok(paused),
            other => unexpected(other),
        }
    }

    pub fn toggle(&self) -> Result<TransportStatus> {
        match self.request(Command::Toggle)? {
            Outcome::Status(status) => Ok(status),
            other => unexpected(other),
        }
    }

    pub fn stop(&self) -> Result<()> {
        match self.request(Command::Stop)? {
            Outcome::Status(_) => Ok(()),
            other => unexpected(other),
        }
    }

    pub fn set_tempo(&self, bpm: i64) -> Result<Tempo> {
        match self.request(Command::SetTempo(bpm))? {
            Outcome::Tempo(tempo) => Ok(tempo),
            other => unexpected(other),
        }
    }

    /// Appends a default measure; returns its 0-based index.
    pub fn add_measure(&self) -> Result<usize> {
        match self.request(Command::AddMeasure)? {
            Outcome::Index(i) => Ok(i),
            other => unexpected(other),
        }
    }

    pub fn remove_measure(&self, index: usize) -> Result<Measure> {
        match self.request(Command::RemoveMeasure(index))? {
            Outcome::Measure(m) => Ok(m),
            other => unexpected(other),
        }
    }

    /// Resizes a measure and returns it as it now stands.
    pub fn set_subdivisions(&self, measure: usize, subdivisions: i64) -> Result<Measure> {
        match self.request(Command::SetSubdivisions { measure, subdivisions })? {
            Outcome::Measure(m) => Ok(m),
            other => unexpected(other),
        }
    }

    pub fn rotate_pulse(&self, measure: usize, pulse: usize) -> Result<PulseState> {
        match self.request(Command::RotatePulse { measure, pulse })? {
            Outcome::Pulse(state) => Ok(state),
            other => unexpected(other),
        }
    }

    pub fn open_editor(&self, index: usize) -> Result<Measure> {
        match self.request(Command::OpenEditor(index))? {
            Outcome::Measure(m) => Ok(m),
            other => unexpected(other),
        }
    }

    pub fn close_editor(&self) -> Result<()> {
        match self.request(Command::CloseEditor)? {
            Outcome::Done => Ok(()),
            other => unexpected(other),
        }
    }

    pub fn load(&self, document: Document) -> Result<()> {
        match self.request(Command::Load(document))? {
            Outcome::Done => Ok(()),
            other => unexpected(other),
        }
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        match self.request(Command::Snapshot)? {
            Outcome::Snapshot(s) => Ok(s),
            other => unexpected(other),
        }
    }

    pub fn document(&self) -> Result<Document> {
        Ok(self.snapshot()?.document)
    }

    /// Latest playhead, readable without a round trip to the engine.
    pub fn playhead(&self) -> Playhead {
        *self.playhead.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EngineHandle {
    pub fn client(&self) -> EngineClient {
        self.client.clone()
    }

    /// Stops playback and joins the engine thread.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.client.tx.send(ControlMsg::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::ops::Deref for EngineHandle {
    type Target = EngineClient;

    fn deref(&self) -> &EngineClient {
        &self.client
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.join();
    }
}

fn unexpected<T>(outcome: Outcome) -> Result<T> {
    bail!("engine sent an unexpected reply: {:?}", outcome)
}
