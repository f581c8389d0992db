//! Fixed-size statistical summary of a window, the model's only input.

use serde::{Deserialize, Serialize};

use crate::models::{FeatureVector, SequenceWindow, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub mean: FeatureVector,
    pub variance: FeatureVector,
    pub min: FeatureVector,
    pub max: FeatureVector,
    /// Mean absolute change per second.
    pub mean_abs_derivative: FeatureVector,
    pub frame_count: usize,
    pub span_ms: u64,
    pub degraded_ratio: f32,
    /// Frames relative to buffer capacity; below 1.0 only for partial windows.
    pub coverage: f32,
    pub partial: bool,
}

impl WindowSummary {
    /// Summarize a window. Returns `None` for an empty window.
    pub fn from_window(window: &SequenceWindow, capacity: usize) -> Option<Self> {
        let frames = &window.frames;
        if frames.is_empty() {
            return None;
        }

        let n = frames.len() as f32;
        let mut mean = [0.0f32; FEATURE_COUNT];
        let mut min = [f32::INFINITY; FEATURE_COUNT];
        let mut max = [f32::NEG_INFINITY; FEATURE_COUNT];

        for frame in frames {
            for (slot, value) in frame.iter().enumerate() {
                mean[slot] += value / n;
                min[slot] = min[slot].min(*value);
                max[slot] = max[slot].max(*value);
            }
        }

        let mut variance = [0.0f32; FEATURE_COUNT];
        for frame in frames {
            for (slot, value) in frame.iter().enumerate() {
                let delta = value - mean[slot];
                variance[slot] += delta * delta / n;
            }
        }

        let mut mean_abs_derivative = [0.0f32; FEATURE_COUNT];
        if frames.len() > 1 && window.span_ms() > 0 {
            let steps = (frames.len() - 1) as f32;
            let step_secs = window.span_ms() as f32 / 1000.0 / steps;
            for pair in frames.windows(2) {
                for slot in 0..FEATURE_COUNT {
                    mean_abs_derivative[slot] += (pair[1][slot] - pair[0][slot]).abs() / step_secs / steps;
                }
            }
        }

        let coverage = if capacity == 0 {
            1.0
        } else {
            (frames.len() as f32 / capacity as f32).min(1.0)
        };

        Some(Self {
            mean,
            variance,
            min,
            max,
            mean_abs_derivative,
            frame_count: frames.len(),
            span_ms: window.span_ms(),
            degraded_ratio: window.degraded_frames as f32 / n,
            coverage,
            partial: window.partial,
        })
    }

    pub fn range(&self, slot: usize) -> f32 {
        self.max[slot] - self.min[slot]
    }
}
