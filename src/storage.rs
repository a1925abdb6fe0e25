pub mod document;
pub mod preset;
pub mod state;
