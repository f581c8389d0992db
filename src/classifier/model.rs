//! Pluggable scoring model interface.
//!
//! The pipeline never trains or embeds a specific model. A pre-trained
//! scorer is handed to the session manager at `start()` as an
//! `Arc<dyn MovementModel>` and called once per ready window.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MovementLabel;

use super::summary::WindowSummary;

/// Raw model output, validated by the classifier before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub label: MovementLabel,
    pub confidence: f32,
    pub technique_score: f32,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ModelError(pub String);

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Scoring function over a window summary.
///
/// Implementations must be deterministic for a given summary and may be
/// called from the blocking thread pool.
pub trait MovementModel: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, summary: &WindowSummary) -> Result<ModelScore, ModelError>;
}
