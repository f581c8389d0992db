pub mod config;
pub mod sequence;

pub use config::BufferConfig;
pub use sequence::{AppendOutcome, GapInvalidation, SequenceBuffer};
