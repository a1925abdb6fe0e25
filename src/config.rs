//! Engine timing and click settings.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sequencer::transport::StartPolicy;

/// Timing, tone and start settings for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Wall-clock period of the scheduling tick.
    pub tick_period: Duration,
    /// Audio-clock look-ahead window, seconds.
    pub horizon: f64,
    /// Offset added to the audio clock when playback starts, seconds.
    pub lead_in: f64,
    /// Accent frequency; strong pulses sound an octave above.
    pub base_frequency: f32,
    /// Length of one click, seconds.
    pub click_duration: f64,
    pub start_policy: StartPolicy,
    /// Session file rewritten after every edit and restored on start.
    /// `None` turns autosave off.
    pub state_path: Option<PathBuf>,
    /// Directory of named presets.
    pub preset_dir: PathBuf,
}

const STATE_PATH: &str = ".rhythm-weaver/state.json";
const PRESET_DIR: &str = ".rhythm-weaver/presets";

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(25),
            horizon: 0.1,
            lead_in: 0.1,
            base_frequency: 440.0,
            click_duration: 0.05,
            start_policy: StartPolicy::First,
            state_path: None,
            preset_dir: PathBuf::from(PRESET_DIR),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `RHYTHM_*` variables (a `.env` file is loaded first).
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`EngineConfig::default`], but with autosave on unless
    /// `RHYTHM_STATE` is empty or `off`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        cfg.state_path = match lookup("RHYTHM_STATE").map(|v| v.trim().to_string()) {
            None => Some(PathBuf::from(STATE_PATH)),
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("off") => None,
            Some(v) => Some(PathBuf::from(v)),
        };
        if let Some(dir) = lookup("RHYTHM_PRESETS").filter(|d| !d.trim().is_empty()) {
            cfg.preset_dir = PathBuf::from(dir.trim());
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RHYTHM_TICK_MS").filter(|ms| *ms > 0) {
            cfg.tick_period = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<f64>(&lookup, "RHYTHM_HORIZON_MS").filter(|ms| *ms > 0.0) {
            cfg.horizon = ms / 1000.0;
        }
        if let Some(ms) = parse_var::<f64>(&lookup, "RHYTHM_LEAD_IN_MS").filter(|ms| *ms >= 0.0) {
            cfg.lead_in = ms / 1000.0;
        }
        if let Some(hz) = parse_var::<f32>(&lookup, "RHYTHM_BASE_HZ").filter(|hz| *hz > 0.0) {
            cfg.base_frequency = hz;
        }
        if let Some(ms) = parse_var::<f64>(&lookup, "RHYTHM_CLICK_MS").filter(|ms| *ms > 0.0) {
            cfg.click_duration = ms / 1000.0;
        }
        if let Some(policy) = parse_var::<StartPolicy>(&lookup, "RHYTHM_START_AT") {
            cfg.start_policy = policy;
        }
        // A tick must come round well inside the window or clicks are scheduled late.
        if cfg.tick_period.as_secs_f64() >= cfg.horizon {
            let tick = Duration::from_secs_f64(cfg.horizon / 4.0);
            crate::console::warn(format!(
                "tick period {}ms is not shorter than the {}ms look-ahead window; using {}ms",
                cfg.tick_period.as_millis(),
                cfg.horizon * 1000.0,
                tick.as_millis()
            ));
            cfg.tick_period = tick;
        }
        cfg
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            crate::console::warn(format!("ignoring {}={:?}: not a valid value", key, raw));
            None
        }
    }
}
