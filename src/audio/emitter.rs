use super::clock::{AudioClock, Click};
use crate::config::EngineConfig;
use crate::model::PulseState;

const PEAK: f32 = 1.0;
const FLOOR: f32 = 0.001;

/// Maps audible pulses to clicks and hands them to the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioEmitter {
    base_frequency: f32,
    click_duration: f64,
}

impl Default for AudioEmitter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl AudioEmitter {
    pub fn new(base_frequency: f32, click_duration: f64) -> Self {
        Self { base_frequency, click_duration }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.base_frequency, cfg.click_duration)
    }

    /// `None` for a silent pulse.
    pub fn click_for(&self, state: PulseState) -> Option<Click> {
        let frequency = match state {
            PulseState::Silent => return None,
            PulseState::Accent => self.base_frequency,
            PulseState::Strong => self.base_frequency * 2.0,
        };
        Some(Click { frequency, duration: self.click_duration, peak: PEAK, floor: FLOOR })
    }

    /// Schedules the click for `state` at audio time `time`.
    pub fn emit<C: AudioClock + ?Sized>(
        &self,
        clock: &mut C,
        time: f64,
        state: PulseState,
    ) -> Option<Click> {
        let click = self.click_for(state)?;
        clock.schedule(time, click);
        Some(click)
    }
}
