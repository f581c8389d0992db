//! Frame feature adapter.
//!
//! Turns one [`FrameObservation`] into a fixed-size [`FeatureVector`]. Joints
//! below the confidence threshold are filled from the session's recent
//! landmark memory when it is fresh enough; frames that would need too much
//! guessing are rejected before they can reach the buffer.

use crate::error::PipelineError;
use crate::models::{joints, slots, FeatureVector, FrameObservation, Point3, FEATURE_COUNT};

use super::config::AdapterConfig;
use super::geometry::{horizontal_spread, joint_angle, lean_from_vertical, midpoint};

const TRACKED_COUNT: usize = joints::TRACKED.len();

// Tracked slot indices, matching `joints::TRACKED` order.
const LS: usize = 0;
const RS: usize = 1;
const LE: usize = 2;
const RE: usize = 3;
const LW: usize = 4;
const RW: usize = 5;
const LH: usize = 6;
const RH: usize = 7;
const LK: usize = 8;
const RK: usize = 9;
const LA: usize = 10;
const RA: usize = 11;

/// Values used for a feature whose joints are missing and which has no
/// previous value to hold: a person standing upright with arms at the sides.
const NEUTRAL_FEATURES: FeatureVector = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.1, 0.1, 0.0, 0.5, 0.5, 0.33];

/// Last confident position of every tracked joint, plus the last emitted
/// feature vector. One per session.
#[derive(Debug, Clone, Default)]
pub struct LandmarkMemory {
    positions: [Option<(Point3, u64)>; TRACKED_COUNT],
    last_features: Option<FeatureVector>,
}

impl LandmarkMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the confident joints and features of an admitted frame.
    pub fn absorb(&mut self, frame: &AdaptedFrame) {
        for (slot, point) in &frame.fresh {
            self.positions[*slot] = Some((*point, frame.timestamp_ms));
        }
        self.last_features = Some(frame.features);
    }

    fn recall(&self, slot: usize, timestamp_ms: u64, staleness_ms: u64) -> Option<Point3> {
        self.positions[slot].and_then(|(point, seen_at)| {
            let age = timestamp_ms.saturating_sub(seen_at);
            (timestamp_ms >= seen_at && age <= staleness_ms).then_some(point)
        })
    }

    pub fn last_features(&self) -> Option<&FeatureVector> {
        self.last_features.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Adapter output for an accepted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedFrame {
    pub timestamp_ms: u64,
    pub features: FeatureVector,
    /// At least one joint could be neither observed nor imputed.
    pub degraded: bool,
    pub observed: usize,
    pub imputed: usize,
    pub missing: usize,
    /// Confident joints seen in this frame, by tracked slot.
    pub fresh: Vec<(usize, Point3)>,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureAdapter {
    config: AdapterConfig,
}

impl FeatureAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Pure function of the frame and the session's remembered landmarks.
    pub fn adapt(
        &self,
        frame: &FrameObservation,
        memory: &LandmarkMemory,
    ) -> Result<AdaptedFrame, PipelineError> {
        let mut resolved: [Option<Point3>; TRACKED_COUNT] = [None; TRACKED_COUNT];
        let mut fresh = Vec::with_capacity(TRACKED_COUNT);
        let mut imputed = 0usize;
        let mut missing = 0usize;

        for (slot, id) in joints::TRACKED.iter().enumerate() {
            let confident = frame
                .landmark(*id)
                .filter(|landmark| landmark.is_finite() && landmark.confidence >= self.config.min_confidence);

            if let Some(landmark) = confident {
                let point = landmark.point();
                resolved[slot] = Some(point);
                fresh.push((slot, point));
            } else if let Some(point) =
                memory.recall(slot, frame.timestamp_ms, self.config.staleness_ms)
            {
                resolved[slot] = Some(point);
                imputed += 1;
            } else {
                missing += 1;
            }
        }

        let gap_ratio = (imputed + missing) as f32 / TRACKED_COUNT as f32;
        if gap_ratio > self.config.max_missing_ratio {
            return Err(PipelineError::InputRejected {
                timestamp_ms: frame.timestamp_ms,
                reason: format!(
                    "{imputed} imputed and {missing} missing of {TRACKED_COUNT} joints ({:.0}% > {:.0}%)",
                    gap_ratio * 100.0,
                    self.config.max_missing_ratio * 100.0
                ),
            });
        }

        let fallback = memory.last_features().copied().unwrap_or(NEUTRAL_FEATURES);
        let features = compute_features(&resolved, &fallback);

        Ok(AdaptedFrame {
            timestamp_ms: frame.timestamp_ms,
            features,
            degraded: missing > 0,
            observed: fresh.len(),
            imputed,
            missing,
            fresh,
        })
    }
}

fn compute_features(joints: &[Option<Point3>; TRACKED_COUNT], fallback: &FeatureVector) -> FeatureVector {
    let mut features = [0.0f32; FEATURE_COUNT];

    let angle = |a: usize, vertex: usize, b: usize| -> Option<f32> {
        Some(joint_angle(joints[a]?, joints[vertex]?, joints[b]?) / 180.0)
    };

    let trunk_lean = || -> Option<f32> {
        let hips = midpoint(joints[LH]?, joints[RH]?);
        let shoulders = midpoint(joints[LS]?, joints[RS]?);
        Some((lean_from_vertical(hips, shoulders) / 90.0).min(1.0))
    };

    let knee_valgus = || -> Option<f32> {
        let knee_spread = horizontal_spread(joints[LK]?, joints[RK]?);
        let ankle_spread = horizontal_spread(joints[LA]?, joints[RA]?);
        let ratio = if ankle_spread < 1e-3 {
            1.0
        } else {
            knee_spread / ankle_spread
        };
        Some((ratio / 2.0).clamp(0.0, 1.0))
    };

    let hip_height = || -> Option<f32> {
        let hips = midpoint(joints[LH]?, joints[RH]?);
        let shoulders = midpoint(joints[LS]?, joints[RS]?);
        let ankles = midpoint(joints[LA]?, joints[RA]?);
        let span = ankles.y - shoulders.y;
        if span.abs() < 1e-3 {
            return Some(0.5);
        }
        Some(((ankles.y - hips.y) / span).clamp(0.0, 1.0))
    };

    let stance_width = || -> Option<f32> {
        let ankle_spread = horizontal_spread(joints[LA]?, joints[RA]?);
        let shoulder_spread = horizontal_spread(joints[LS]?, joints[RS]?);
        if shoulder_spread < 1e-3 {
            return None;
        }
        Some((ankle_spread / shoulder_spread / 3.0).clamp(0.0, 1.0))
    };

    let computed = [
        (slots::LEFT_KNEE_ANGLE, angle(LH, LK, LA)),
        (slots::RIGHT_KNEE_ANGLE, angle(RH, RK, RA)),
        (slots::LEFT_HIP_ANGLE, angle(LS, LH, LK)),
        (slots::RIGHT_HIP_ANGLE, angle(RS, RH, RK)),
        (slots::LEFT_ELBOW_ANGLE, angle(LS, LE, LW)),
        (slots::RIGHT_ELBOW_ANGLE, angle(RS, RE, RW)),
        (slots::LEFT_SHOULDER_ANGLE, angle(LH, LS, LE)),
        (slots::RIGHT_SHOULDER_ANGLE, angle(RH, RS, RE)),
        (slots::TRUNK_LEAN, trunk_lean()),
        (slots::KNEE_VALGUS, knee_valgus()),
        (slots::HIP_HEIGHT, hip_height()),
        (slots::STANCE_WIDTH, stance_width()),
    ];

    for (slot, value) in computed {
        features[slot] = value.unwrap_or(fallback[slot]);
    }

    features
}
