//! Sample-accurate click mixer.
//!
//! The mixer is an endless Source handed to the output device. It counts
//! every frame it renders; that count is the audio clock. Clicks arrive over
//! a channel tagged with the frame they must start on.

use rodio::Source;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use super::clock::Click;
use super::tone::ClickTone;

pub const SAMPLE_RATE: u32 = 48_000;

/// Read side of the mixer's frame counter.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl FrameClock {
    pub fn new(sample_rate: u32) -> Self {
        Self { frames: Arc::new(AtomicU64::new(0)), sample_rate }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame on which audio time `at` falls.
    pub fn frame_at(&self, at: f64) -> u64 {
        (at.max(0.0) * self.sample_rate as f64).round() as u64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledClick {
    pub start_frame: u64,
    pub click: Click,
}

pub struct ClickMixer {
    rx: Receiver<ScheduledClick>,
    pending: Vec<ScheduledClick>,
    active: Vec<ClickTone>,
    frame: u64,
    clock: FrameClock,
}

impl ClickMixer {
    /// Returns the mixer, its clock, and the sender clicks are scheduled through.
    pub fn new(sample_rate: u32) -> (Self, FrameClock, Sender<ScheduledClick>) {
        let (tx, rx) = mpsc::channel();
        let clock = FrameClock::new(sample_rate);
        let mixer = Self {
            rx,
            pending: Vec::new(),
            active: Vec::new(),
            frame: 0,
            clock: clock.clone(),
        };
        (mixer, clock, tx)
    }

    fn start_due(&mut self) {
        self.pending.extend(self.rx.try_iter());
        let frame = self.frame;
        let sample_rate = self.clock.sample_rate;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start_frame <= frame {
                let due = self.pending.swap_remove(i);
                self.active.push(ClickTone::new(due.click, sample_rate));
            } else {
                i += 1;
            }
        }
    }

    pub fn active_voices(&self) -> usize {
        self.active.len()
    }
}

impl Iterator for ClickMixer {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.start_due();
        let mut sum = 0.0;
        self.active.retain_mut(|voice| match voice.next() {
            Some(s) => {
                sum += s;
                true
            }
            None => false,
        });
        self.frame += 1;
        self.clock.frames.store(self.frame, Ordering::Release);
        Some(sum.clamp(-1.0, 1.0))
    }
}

impl Source for ClickMixer {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.clock.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click() -> Click {
        Click { frequency: 1_000.0, duration: 0.001, peak: 1.0, floor: 0.001 }
    }

    #[test]
    fn clock_counts_rendered_frames() {
        let (mut mixer, clock, _tx) = ClickMixer::new(1_000);
        assert_eq!(clock.now(), 0.0);
        for _ in 0..250 {
            mixer.next();
        }
        assert_eq!(clock.frames(), 250);
        assert!((clock.now() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn click_starts_on_its_frame() {
        let (mut mixer, clock, tx) = ClickMixer::new(8_000);
        let at = 0.01;
        tx.send(ScheduledClick { start_frame: clock.frame_at(at), click: click() }).unwrap();
        let rendered: Vec<f32> = (0..200).map(|_| mixer.next().unwrap()).collect();
        let first_voiced = rendered.iter().position(|s| *s != 0.0).unwrap();
        // Frame 80 starts the tone at phase 0, so the first audible sample is the next one.
        assert_eq!(first_voiced, 81);
        assert!(rendered[..80].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn late_clicks_start_immediately_and_finish() {
        let (mut mixer, _clock, tx) = ClickMixer::new(8_000);
        for _ in 0..100 {
            mixer.next();
        }
        tx.send(ScheduledClick { start_frame: 10, click: click() }).unwrap();
        mixer.next();
        assert_eq!(mixer.active_voices(), 1);
        for _ in 0..20 {
            mixer.next();
        }
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn mixer_never_ends() {
        let (mixer, _clock, _tx) = ClickMixer::new(48_000);
        assert!(mixer.total_duration().is_none());
        assert_eq!(mixer.take(10).count(), 10);
    }
}
