//! Error taxonomy for the analysis pipeline.
//!
//! Only `ClassificationFailure` with `escalated = true` and an explicit abort
//! end a session abnormally. Everything else is recoverable where it happens
//! and most of it never leaves the session manager as an `Err`: rejected
//! frames and invalidated windows are reported in the frame outcome instead.

use thiserror::Error;

use crate::models::SessionStatus;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Frame dropped before reaching the buffer.
    #[error("frame at {timestamp_ms}ms rejected: {reason}")]
    InputRejected { timestamp_ms: u64, reason: String },

    /// Partial window discarded because of a timing gap.
    #[error("window invalidated: {gap_ms}ms gap exceeds {max_gap_ms}ms, {discarded} frames dropped")]
    WindowInvalidated {
        gap_ms: u64,
        max_gap_ms: u64,
        discarded: usize,
    },

    /// Model call failed or returned unusable output.
    #[error("classification failed ({consecutive} consecutive): {reason}")]
    ClassificationFailure {
        reason: String,
        consecutive: u32,
        /// The retry budget is spent and the session has been failed.
        escalated: bool,
    },

    /// Operation not valid for the session's current status.
    #[error("cannot {operation} session in {status} state")]
    SessionState {
        operation: &'static str,
        status: SessionStatus,
    },

    /// Student context lookup failed; risk proceeds without the multiplier.
    #[error("student context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    pub fn session_state(operation: &'static str, status: SessionStatus) -> Self {
        PipelineError::SessionState { operation, status }
    }

    /// Whether this error ended the session it came from.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineError::ClassificationFailure {
                escalated: true,
                ..
            }
        )
    }
}
