use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Minimum spacing between non-critical events, on frame timestamps.
    pub min_interval_ms: u64,

    /// Windows scoring below this get a correction cue.
    pub correction_threshold: f32,

    /// Emit encouragement for clean windows. Off leaves only corrections and alerts.
    pub emit_info: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 2_000,
            correction_threshold: 0.6,
            emit_info: true,
        }
    }
}
