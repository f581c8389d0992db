//! Deterministic rule-based reference model.
//!
//! Not a substitute for a trained model; it gives the demo runner and the
//! integration tests something real to score windows with. Thresholds are
//! in normalized feature units (see `models::window::slots`).

use crate::models::{slots, MovementLabel};

use super::model::{ModelError, ModelScore, MovementModel};
use super::summary::WindowSummary;

const HORIZONTAL_TRUNK: f32 = 0.75;
const ACTIVE_KNEE_RANGE: f32 = 0.2;
const SQUAT_HIP_RANGE: f32 = 0.12;
const KNEE_ASYMMETRY: f32 = 0.1;
const JUMP_HIP_SPEED: f32 = 1.5;
const RUNNING_KNEE_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Default)]
pub struct RuleBasedModel;

impl RuleBasedModel {
    pub fn new() -> Self {
        Self
    }

    fn detect(&self, summary: &WindowSummary) -> (MovementLabel, f32) {
        let trunk = summary.mean[slots::TRUNK_LEAN];
        let knee_range = summary
            .range(slots::LEFT_KNEE_ANGLE)
            .max(summary.range(slots::RIGHT_KNEE_ANGLE));
        let elbow_range = summary
            .range(slots::LEFT_ELBOW_ANGLE)
            .max(summary.range(slots::RIGHT_ELBOW_ANGLE));
        let hip_range = summary.range(slots::HIP_HEIGHT);
        let hip_speed = summary.mean_abs_derivative[slots::HIP_HEIGHT];
        let knee_speed = (summary.mean_abs_derivative[slots::LEFT_KNEE_ANGLE]
            + summary.mean_abs_derivative[slots::RIGHT_KNEE_ANGLE])
            / 2.0;
        let asymmetry =
            (summary.mean[slots::LEFT_KNEE_ANGLE] - summary.mean[slots::RIGHT_KNEE_ANGLE]).abs();

        if trunk >= HORIZONTAL_TRUNK {
            return if elbow_range > 0.2 {
                (MovementLabel::PushUp, strength(elbow_range, 0.2, 0.5))
            } else {
                (MovementLabel::Plank, 0.8)
            };
        }

        if hip_speed > JUMP_HIP_SPEED && knee_range > ACTIVE_KNEE_RANGE {
            return (MovementLabel::JumpLanding, strength(hip_speed, JUMP_HIP_SPEED, 3.0));
        }

        if knee_speed > RUNNING_KNEE_SPEED && hip_range < SQUAT_HIP_RANGE {
            return (MovementLabel::Running, strength(knee_speed, RUNNING_KNEE_SPEED, 4.0));
        }

        if knee_range > ACTIVE_KNEE_RANGE {
            if asymmetry >= KNEE_ASYMMETRY {
                return (MovementLabel::Lunge, strength(asymmetry, KNEE_ASYMMETRY, 0.3));
            }
            if hip_range > SQUAT_HIP_RANGE {
                return (MovementLabel::Squat, strength(knee_range, ACTIVE_KNEE_RANGE, 0.5));
            }
        }

        (MovementLabel::Unknown, 0.25)
    }

    fn technique(&self, label: MovementLabel, summary: &WindowSummary) -> f32 {
        let mut score = 1.0f32;

        match label {
            MovementLabel::Plank | MovementLabel::PushUp => {
                // Hip sag or pike shows up as a bent hip angle.
                let hip = (summary.mean[slots::LEFT_HIP_ANGLE] + summary.mean[slots::RIGHT_HIP_ANGLE]) / 2.0;
                if hip < 0.85 {
                    score -= ((0.85 - hip) * 2.0).min(0.4);
                }
            }
            _ => {
                let valgus = summary.min[slots::KNEE_VALGUS];
                if valgus < 0.4 {
                    score -= ((0.4 - valgus) * 2.5).min(0.4);
                }

                let lean = summary.max[slots::TRUNK_LEAN];
                if lean > 0.35 {
                    score -= ((lean - 0.35) * 1.5).min(0.4);
                }

                let asymmetry = (summary.mean[slots::LEFT_KNEE_ANGLE]
                    - summary.mean[slots::RIGHT_KNEE_ANGLE])
                    .abs();
                if label == MovementLabel::Squat && asymmetry > 0.05 {
                    score -= 0.1;
                }

                let deepest = summary.min[slots::LEFT_KNEE_ANGLE].min(summary.min[slots::RIGHT_KNEE_ANGLE]);
                if label == MovementLabel::Squat && deepest > 0.6 {
                    score -= 0.15;
                }
            }
        }

        score.clamp(0.0, 1.0)
    }
}

/// Map how far `value` clears `threshold` onto a 0.5-0.95 confidence.
fn strength(value: f32, threshold: f32, saturation: f32) -> f32 {
    let span = (saturation - threshold).max(f32::EPSILON);
    let excess = ((value - threshold) / span).clamp(0.0, 1.0);
    0.5 + 0.45 * excess
}

impl MovementModel for RuleBasedModel {
    fn name(&self) -> &str {
        "rule-based-v1"
    }

    fn score(&self, summary: &WindowSummary) -> Result<ModelScore, ModelError> {
        if summary.frame_count == 0 {
            return Err(ModelError::new("empty summary"));
        }

        let (label, raw_confidence) = self.detect(summary);
        let confidence = raw_confidence * (1.0 - 0.5 * summary.degraded_ratio.clamp(0.0, 1.0));

        Ok(ModelScore {
            label,
            confidence,
            technique_score: self.technique(label, summary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureVector, SequenceWindow, FEATURE_COUNT};

    const STANDING: FeatureVector = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.1, 0.1, 0.0, 0.5, 0.55, 0.33];

    fn summarize(frames: Vec<FeatureVector>) -> WindowSummary {
        let window = SequenceWindow {
            sequence: 1,
            end_ms: (frames.len() as u64 - 1) * 33,
            frames,
            start_ms: 0,
            degraded_frames: 0,
            partial: false,
        };
        WindowSummary::from_window(&window, 30).unwrap()
    }

    /// One slow squat rep: knees bend to `depth` and hips drop with them.
    fn squat(depth: f32, valgus: f32, lean: f32) -> Vec<FeatureVector> {
        (0..30)
            .map(|i| {
                let phase = (i as f32 / 29.0 * std::f32::consts::PI).sin();
                let mut frame = STANDING;
                frame[slots::LEFT_KNEE_ANGLE] = 1.0 - (1.0 - depth) * phase;
                frame[slots::RIGHT_KNEE_ANGLE] = 1.0 - (1.0 - depth) * phase;
                frame[slots::LEFT_HIP_ANGLE] = 1.0 - 0.5 * phase;
                frame[slots::RIGHT_HIP_ANGLE] = 1.0 - 0.5 * phase;
                frame[slots::HIP_HEIGHT] = 0.55 - 0.25 * phase;
                frame[slots::KNEE_VALGUS] = 0.5 - (0.5 - valgus) * phase;
                frame[slots::TRUNK_LEAN] = lean * phase;
                frame
            })
            .collect()
    }

    #[test]
    fn test_clean_squat() {
        let score = RuleBasedModel::new().score(&summarize(squat(0.5, 0.5, 0.2))).unwrap();
        assert_eq!(score.label, MovementLabel::Squat);
        assert!(score.confidence >= 0.5);
        assert!(score.technique_score > 0.9);
    }

    #[test]
    fn test_knee_cave_and_lean_lower_technique() {
        let clean = RuleBasedModel::new().score(&summarize(squat(0.5, 0.5, 0.2))).unwrap();
        let poor = RuleBasedModel::new().score(&summarize(squat(0.5, 0.2, 0.6))).unwrap();
        assert_eq!(poor.label, MovementLabel::Squat);
        assert!(poor.technique_score < clean.technique_score - 0.4);
    }

    #[test]
    fn test_still_standing_is_unknown() {
        let score = RuleBasedModel::new().score(&summarize(vec![STANDING; 30])).unwrap();
        assert_eq!(score.label, MovementLabel::Unknown);
        assert!(score.confidence < 0.4);
    }

    #[test]
    fn test_horizontal_hold_is_plank() {
        let mut frame = STANDING;
        frame[slots::TRUNK_LEAN] = 0.95;
        frame[slots::LEFT_HIP_ANGLE] = 0.95;
        frame[slots::RIGHT_HIP_ANGLE] = 0.95;
        let score = RuleBasedModel::new().score(&summarize(vec![frame; 30])).unwrap();
        assert_eq!(score.label, MovementLabel::Plank);
        assert_eq!(score.technique_score, 1.0);
    }

    #[test]
    fn test_output_is_deterministic() {
        let summary = summarize(squat(0.4, 0.3, 0.4));
        let model = RuleBasedModel::new();
        assert_eq!(model.score(&summary).unwrap(), model.score(&summary).unwrap());
        assert!(summary.mean.len() == FEATURE_COUNT);
    }
}
