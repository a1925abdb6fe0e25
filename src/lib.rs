//! A step-sequencer metronome: editable measures of accented pulses, played
//! back by a look-ahead scheduler against a sample-accurate audio clock.

pub mod audio;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod model;
pub mod repl;
pub mod sequencer;
pub mod storage;

pub use error::{Error, Result, ValidationError};
