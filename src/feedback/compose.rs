//! Turn a classified, risk-scored window into at most one feedback candidate.
//!
//! Priority: critical alert, high-risk alert, technique correction, info.

use crate::classifier::WindowSummary;
use crate::models::{
    slots, ClassificationResult, FeedbackKind, FeedbackPayload, MovementLabel, RiskAssessment,
    RiskTier,
};

use super::config::FeedbackConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackCandidate {
    pub kind: FeedbackKind,
    pub payload: FeedbackPayload,
}

impl FeedbackCandidate {
    pub fn is_critical(&self) -> bool {
        self.kind == FeedbackKind::RiskAlert && self.payload.tier == Some(RiskTier::Critical)
    }
}

/// Technique faults, checked in order of injury relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    KneesCaving,
    ExcessiveLean,
    HipSag,
    ShallowDepth,
    NarrowStance,
    General,
}

impl Cue {
    pub fn code(&self) -> &'static str {
        match self {
            Cue::KneesCaving => "knees_caving",
            Cue::ExcessiveLean => "excessive_lean",
            Cue::HipSag => "hip_sag",
            Cue::ShallowDepth => "shallow_depth",
            Cue::NarrowStance => "narrow_stance",
            Cue::General => "form_check",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Cue::KneesCaving => "Push your knees out in line with your toes.",
            Cue::ExcessiveLean => "Keep your chest up and your back straight.",
            Cue::HipSag => "Brace your core and keep your hips level.",
            Cue::ShallowDepth => "Go a little deeper while keeping control.",
            Cue::NarrowStance => "Widen your stance to about shoulder width.",
            Cue::General => "Slow down and focus on controlled form.",
        }
    }
}

/// Pick the most relevant technique fault visible in the window.
pub fn select_cue(label: MovementLabel, summary: &WindowSummary) -> Cue {
    if matches!(label, MovementLabel::Plank | MovementLabel::PushUp) {
        let hip = (summary.mean[slots::LEFT_HIP_ANGLE] + summary.mean[slots::RIGHT_HIP_ANGLE]) / 2.0;
        return if hip < 0.85 { Cue::HipSag } else { Cue::General };
    }

    if summary.min[slots::KNEE_VALGUS] < 0.4 {
        Cue::KneesCaving
    } else if summary.max[slots::TRUNK_LEAN] > 0.35 {
        Cue::ExcessiveLean
    } else if label == MovementLabel::Squat
        && summary.min[slots::LEFT_KNEE_ANGLE].min(summary.min[slots::RIGHT_KNEE_ANGLE]) > 0.6
    {
        Cue::ShallowDepth
    } else if summary.mean[slots::STANCE_WIDTH] < 0.2 {
        Cue::NarrowStance
    } else {
        Cue::General
    }
}

pub fn compose(
    classification: &ClassificationResult,
    assessment: &RiskAssessment,
    summary: &WindowSummary,
    config: &FeedbackConfig,
) -> Option<FeedbackCandidate> {
    let movement = Some(classification.label);

    match assessment.risk_tier {
        RiskTier::Critical => {
            return Some(FeedbackCandidate {
                kind: FeedbackKind::RiskAlert,
                payload: FeedbackPayload {
                    code: "critical_risk".into(),
                    message: format!(
                        "Stop and reset: high injury risk during {}.",
                        classification.label.as_str()
                    ),
                    movement,
                    tier: Some(RiskTier::Critical),
                },
            });
        }
        RiskTier::High => {
            return Some(FeedbackCandidate {
                kind: FeedbackKind::RiskAlert,
                payload: FeedbackPayload {
                    code: "elevated_risk".into(),
                    message: select_cue(classification.label, summary).message().into(),
                    movement,
                    tier: Some(RiskTier::High),
                },
            });
        }
        RiskTier::Low | RiskTier::Moderate => {}
    }

    if classification.technique_score < config.correction_threshold {
        let cue = select_cue(classification.label, summary);
        return Some(FeedbackCandidate {
            kind: FeedbackKind::Correction,
            payload: FeedbackPayload {
                code: cue.code().into(),
                message: cue.message().into(),
                movement,
                tier: None,
            },
        });
    }

    if !config.emit_info {
        return None;
    }

    let (code, message) = if classification.label == MovementLabel::Unknown {
        ("movement_unrecognized", "Movement not recognized, keep going.".to_string())
    } else {
        (
            "good_form",
            format!("Good {} form, keep it up.", classification.label.as_str().replace('_', " ")),
        )
    };

    Some(FeedbackCandidate {
        kind: FeedbackKind::Info,
        payload: FeedbackPayload {
            code: code.into(),
            message,
            movement,
            tier: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SequenceWindow, FEATURE_COUNT};

    const UPRIGHT: [f32; FEATURE_COUNT] = [0.5, 0.5, 0.6, 0.6, 1.0, 1.0, 0.1, 0.1, 0.1, 0.5, 0.4, 0.33];

    fn summary(adjust: impl Fn(&mut [f32; FEATURE_COUNT])) -> WindowSummary {
        let mut frame = UPRIGHT;
        adjust(&mut frame);
        let window = SequenceWindow {
            sequence: 1,
            frames: vec![frame; 30],
            start_ms: 0,
            end_ms: 990,
            degraded_frames: 0,
            partial: false,
        };
        WindowSummary::from_window(&window, 30).unwrap()
    }

    fn classification(label: MovementLabel, technique: f32) -> ClassificationResult {
        ClassificationResult {
            window_sequence: 1,
            label,
            label_confidence: 0.9,
            technique_score: technique,
            partial: false,
        }
    }

    fn assessment(tier: RiskTier) -> RiskAssessment {
        RiskAssessment {
            risk_score: 0.1,
            risk_tier: tier,
            computed_tier: tier,
            contributing_factors: Vec::new(),
            context_unavailable: false,
            critical_latched: tier == RiskTier::Critical,
        }
    }

    #[test]
    fn test_critical_alert_takes_priority() {
        let candidate = compose(
            &classification(MovementLabel::JumpLanding, 0.9),
            &assessment(RiskTier::Critical),
            &summary(|_| {}),
            &FeedbackConfig::default(),
        )
        .unwrap();
        assert!(candidate.is_critical());
        assert_eq!(candidate.payload.code, "critical_risk");
    }

    #[test]
    fn test_poor_technique_gets_specific_cue() {
        let candidate = compose(
            &classification(MovementLabel::Squat, 0.4),
            &assessment(RiskTier::Moderate),
            &summary(|frame| frame[slots::KNEE_VALGUS] = 0.3),
            &FeedbackConfig::default(),
        )
        .unwrap();
        assert_eq!(candidate.kind, FeedbackKind::Correction);
        assert_eq!(candidate.payload.code, "knees_caving");
    }

    #[test]
    fn test_cue_order() {
        assert_eq!(
            select_cue(MovementLabel::Squat, &summary(|f| f[slots::TRUNK_LEAN] = 0.5)),
            Cue::ExcessiveLean
        );
        assert_eq!(
            select_cue(MovementLabel::Plank, &summary(|f| {
                f[slots::LEFT_HIP_ANGLE] = 0.7;
                f[slots::RIGHT_HIP_ANGLE] = 0.7;
            })),
            Cue::HipSag
        );
        assert_eq!(
            select_cue(MovementLabel::Squat, &summary(|f| {
                f[slots::LEFT_KNEE_ANGLE] = 0.9;
                f[slots::RIGHT_KNEE_ANGLE] = 0.9;
            })),
            Cue::ShallowDepth
        );
    }

    #[test]
    fn test_clean_window_is_info_unless_disabled() {
        let config = FeedbackConfig::default();
        let info = compose(
            &classification(MovementLabel::PushUp, 0.9),
            &assessment(RiskTier::Low),
            &summary(|_| {}),
            &config,
        )
        .unwrap();
        assert_eq!(info.kind, FeedbackKind::Info);
        assert_eq!(info.payload.message, "Good push up form, keep it up.");

        let quiet = FeedbackConfig {
            emit_info: false,
            ..config
        };
        assert!(compose(
            &classification(MovementLabel::PushUp, 0.9),
            &assessment(RiskTier::Low),
            &summary(|_| {}),
            &quiet,
        )
        .is_none());
    }
}
