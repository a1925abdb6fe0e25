use std::time::Instant;

/// A short decaying tone, ready to be scheduled on an audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub frequency: f32,
    /// Seconds from onset to the end of the decay.
    pub duration: f64,
    /// Onset amplitude.
    pub peak: f32,
    /// Amplitude reached at the end of the decay.
    pub floor: f32,
}

/// Monotonic, sample-accurate time plus the primitive that starts a sound at
/// an absolute time on that clock.
pub trait AudioClock {
    /// Current audio time in seconds. Never decreases.
    fn now(&self) -> f64;
    /// Start `click` at audio time `at`. Times already past start as soon as possible.
    fn schedule(&mut self, at: f64, click: Click);
}

impl<C: AudioClock + ?Sized> AudioClock for Box<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn schedule(&mut self, at: f64, click: Click) {
        (**self).schedule(at, click)
    }
}

/// Clock driven by hand; records everything scheduled on it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: f64,
    scheduled: Vec<(f64, Click)>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: f64) -> Self {
        Self { now, scheduled: Vec::new() }
    }

    /// Moves time forward; a negative step is ignored so the clock stays monotonic.
    pub fn advance(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.now += seconds;
        }
    }

    pub fn scheduled(&self) -> &[(f64, Click)] {
        &self.scheduled
    }

    pub fn take_scheduled(&mut self) -> Vec<(f64, Click)> {
        std::mem::take(&mut self.scheduled)
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, at: f64, click: Click) {
        self.scheduled.push((at, click));
    }
}

/// Wall-time clock with no output device: clicks are counted and logged.
#[derive(Debug)]
pub struct HeadlessClock {
    origin: Instant,
    scheduled: usize,
}

impl HeadlessClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), scheduled: 0 }
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }
}

impl Default for HeadlessClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for HeadlessClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, at: f64, click: Click) {
        self.scheduled += 1;
        crate::console::info(format!("click {:.0}Hz at {:.3}s", click.frequency, at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_monotonic() {
        let mut c = ManualClock::starting_at(1.0);
        c.advance(0.5);
        c.advance(-2.0);
        assert!((c.now() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn headless_clock_counts_schedules() {
        let mut c = HeadlessClock::new();
        let a = c.now();
        c.schedule(0.2, Click { frequency: 440.0, duration: 0.05, peak: 1.0, floor: 0.001 });
        assert_eq!(c.scheduled_count(), 1);
        assert!(c.now() >= a);
    }
}
