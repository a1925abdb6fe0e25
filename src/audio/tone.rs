//! Click synthesis.

use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

use super::clock::Click;

/// A sine burst with an exponential decay, rendered as a finite mono Source.
pub struct ClickTone {
    frequency: f32,
    peak: f32,
    /// Amplitude ratio applied per frame: `(floor / peak)^(1 / frames)`.
    decay_per_frame: f32,
    amplitude: f32,
    frame: u64,
    frames: u64,
    sample_rate: u32,
}

impl ClickTone {
    pub fn new(click: Click, sample_rate: u32) -> Self {
        let frames = (click.duration * sample_rate as f64).round().max(1.0) as u64;
        let ratio = (click.floor / click.peak).clamp(f32::MIN_POSITIVE, 1.0);
        Self {
            frequency: click.frequency,
            peak: click.peak,
            decay_per_frame: ratio.powf(1.0 / frames as f32),
            amplitude: click.peak,
            frame: 0,
            frames,
            sample_rate,
        }
    }

    /// Envelope value at `t` seconds after onset.
    pub fn envelope_at(click: &Click, t: f64) -> f32 {
        if t < 0.0 || t > click.duration {
            return 0.0;
        }
        let ratio = (click.floor / click.peak) as f64;
        (click.peak as f64 * ratio.powf(t / click.duration)) as f32
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Iterator for ClickTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame >= self.frames {
            return None;
        }
        let t = self.frame as f32 / self.sample_rate as f32;
        let sample = (TAU * self.frequency * t).sin() * self.amplitude;
        self.amplitude *= self.decay_per_frame;
        self.frame += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.frames - self.frame) as usize;
        (left, Some(left))
    }
}

impl Source for ClickTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.frames - self.frame) as usize)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64))
    }
}

impl std::fmt::Debug for ClickTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickTone")
            .field("frequency", &self.frequency)
            .field("peak", &self.peak)
            .field("frame", &self.frame)
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click() -> Click {
        Click { frequency: 440.0, duration: 0.05, peak: 1.0, floor: 0.001 }
    }

    #[test]
    fn tone_lasts_exactly_the_click_duration() {
        let tone = ClickTone::new(click(), 48_000);
        assert_eq!(tone.frames(), 2_400);
        assert_eq!(tone.count(), 2_400);
        let tone = ClickTone::new(click(), 48_000);
        let d = tone.total_duration().unwrap();
        assert!((d.as_secs_f64() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn envelope_starts_at_peak_and_decays_to_floor() {
        let c = click();
        assert!((ClickTone::envelope_at(&c, 0.0) - 1.0).abs() < 1e-6);
        assert!((ClickTone::envelope_at(&c, 0.05) - 0.001).abs() < 1e-6);
        assert!(ClickTone::envelope_at(&c, 0.025) < 0.05);
        assert_eq!(ClickTone::envelope_at(&c, 0.06), 0.0);
    }

    #[test]
    fn samples_stay_under_the_envelope() {
        let c = click();
        let tone = ClickTone::new(c, 48_000);
        for (i, s) in tone.enumerate() {
            let t = i as f64 / 48_000.0;
            assert!(s.abs() <= ClickTone::envelope_at(&c, t) + 1e-3);
        }
    }

    #[test]
    fn reports_mono_stream_format() {
        let tone = ClickTone::new(click(), 44_100);
        assert_eq!(tone.channels(), 1);
        assert_eq!(tone.sample_rate(), 44_100);
    }
}
