pub mod cues;
pub mod scheduler;
pub mod session;
pub mod ticker;
pub mod transport;

pub use cues::{CueRegistry, Playhead, SharedPlayhead};
pub use scheduler::{PulseSink, Scheduler, VisualCue};
pub use session::Session;
pub use ticker::Ticker;
pub use transport::{Position, StartPolicy, Transport, TransportStatus};
