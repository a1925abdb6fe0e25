pub mod document;
pub mod measure;
pub mod pulse;
pub mod sequence;
pub mod tempo;

pub use document::Document;
pub use measure::Measure;
pub use pulse::PulseState;
pub use sequence::{Sequence, SequenceEdit};
pub use tempo::Tempo;
