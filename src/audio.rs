//! Audio side of playback: the clock abstraction, click synthesis, and the
//! output backends.

pub mod clock;
pub mod device;
pub mod emitter;
pub mod mixer;
pub mod tone;

pub use clock::{AudioClock, Click, HeadlessClock, ManualClock};
pub use device::DeviceClock;
pub use emitter::AudioEmitter;
