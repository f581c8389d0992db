//! Feedback - one candidate per classified window, gated per session by
//! deduplication and a frame-time rate limit.

pub mod compose;
pub mod config;
pub mod emitter;

pub use compose::{compose, select_cue, Cue, FeedbackCandidate};
pub use config::FeedbackConfig;
pub use emitter::{EmitDecision, FeedbackEmitter};
