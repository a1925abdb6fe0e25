use std::sync::mpsc::Sender;

use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle};

use super::clock::{AudioClock, Click};
use super::mixer::{ClickMixer, FrameClock, ScheduledClick, SAMPLE_RATE};

/// Audio clock backed by the default output device.
///
/// Time is the number of frames the device has pulled from the click mixer,
/// so a scheduled click lands on an exact frame regardless of when the
/// scheduling thread woke up.
pub struct DeviceClock {
    clock: FrameClock,
    tx: Sender<ScheduledClick>,
    _handle: OutputStreamHandle,
    // Dropping the stream closes the device.
    _stream: OutputStream,
}

impl DeviceClock {
    /// Opens the default device. The returned value is not `Send` on every
    /// platform; create it on the thread that will use it.
    pub fn open() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default().context("opening audio output")?;
        let (mixer, clock, tx) = ClickMixer::new(SAMPLE_RATE);
        handle.play_raw(mixer).context("starting click mixer")?;
        Ok(Self { clock, tx, _handle: handle, _stream: stream })
    }
}

impl AudioClock for DeviceClock {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn schedule(&mut self, at: f64, click: Click) {
        let start_frame = self.clock.frame_at(at);
        if self.tx.send(ScheduledClick { start_frame, click }).is_err() {
            crate::console::error("audio output closed; click dropped");
        }
    }
}
