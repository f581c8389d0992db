//! Feature vectors and the windows built from them.

use serde::{Deserialize, Serialize};

/// Number of features per frame. Constant for the process lifetime.
pub const FEATURE_COUNT: usize = 12;

/// Fixed-length per-frame feature vector, every slot normalized to 0-1.
pub type FeatureVector = [f32; FEATURE_COUNT];

/// Feature slot indices.
///
/// - 0/1: left/right knee angle (0-180° scaled)
/// - 2/3: left/right hip angle
/// - 4/5: left/right elbow angle
/// - 6/7: left/right shoulder angle
/// - 8: trunk lean from vertical (0-90° scaled)
/// - 9: knee valgus ratio, knee spread over ankle spread (0-2 scaled)
/// - 10: hip height between ankles (0) and shoulders (1)
/// - 11: stance width, ankle spread over shoulder spread (0-3 scaled)
pub mod slots {
    pub const LEFT_KNEE_ANGLE: usize = 0;
    pub const RIGHT_KNEE_ANGLE: usize = 1;
    pub const LEFT_HIP_ANGLE: usize = 2;
    pub const RIGHT_HIP_ANGLE: usize = 3;
    pub const LEFT_ELBOW_ANGLE: usize = 4;
    pub const RIGHT_ELBOW_ANGLE: usize = 5;
    pub const LEFT_SHOULDER_ANGLE: usize = 6;
    pub const RIGHT_SHOULDER_ANGLE: usize = 7;
    pub const TRUNK_LEAN: usize = 8;
    pub const KNEE_VALGUS: usize = 9;
    pub const HIP_HEIGHT: usize = 10;
    pub const STANCE_WIDTH: usize = 11;
}

/// An ordered run of feature vectors handed to the classifier.
///
/// Always a copy of buffer contents, never a view into the live buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceWindow {
    /// Per-session counter, starts at 1.
    pub sequence: u64,
    pub frames: Vec<FeatureVector>,
    pub start_ms: u64,
    pub end_ms: u64,
    pub degraded_frames: usize,
    /// Final best-effort window flushed at completion, shorter than capacity.
    pub partial: bool,
}

impl SequenceWindow {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn span_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}
