//! Injury-risk estimation for one classified window.

use crate::models::{
    ClassificationResult, ContributingFactor, FactorKind, MovementLabel, RiskAssessment,
    RiskFactors, RiskTier,
};

use super::config::RiskConfig;

/// Session history the estimator reads. Owned by the session; the estimator
/// itself keeps no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskHistory<'a> {
    /// Technique scores of earlier windows, oldest first.
    pub recent_technique: &'a [f32],
    /// Session has reached CRITICAL and nobody acknowledged it yet.
    pub critical_latched: bool,
}

/// Student context as resolved at session start.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RiskContext {
    Factors(RiskFactors),
    /// No student attached or no context provider configured.
    #[default]
    NotRequested,
    /// Lookup failed; risk proceeds without the multiplier.
    Unavailable,
}

#[derive(Debug, Clone, Default)]
pub struct RiskEstimator {
    config: RiskConfig,
}

impl RiskEstimator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn assess(
        &self,
        classification: &ClassificationResult,
        history: &RiskHistory<'_>,
        context: &RiskContext,
    ) -> RiskAssessment {
        let weights = &self.config.weights;
        let technique = classification.technique_score.clamp(0.0, 1.0);

        let technique_term = weights.technique * (1.0 - technique);
        let base_term = weights.base * self.config.base_risk_for(classification.label);
        let fatigue_term = weights.fatigue * self.fatigue(history.recent_technique, technique);

        let raw = technique_term + base_term + fatigue_term;
        let multiplier = match context {
            RiskContext::Factors(factors) => self.multiplier(factors),
            RiskContext::NotRequested | RiskContext::Unavailable => 1.0,
        };
        let risk_score = (raw * multiplier).clamp(0.0, 1.0);

        let base_kind = if classification.label == MovementLabel::Unknown {
            FactorKind::UnknownMovement
        } else {
            FactorKind::MovementBaseRisk
        };

        let mut contributing_factors: Vec<ContributingFactor> = [
            (FactorKind::PoorTechnique, technique_term),
            (base_kind, base_term),
            (FactorKind::Fatigue, fatigue_term),
            (FactorKind::StudentHistory, raw * (multiplier - 1.0)),
        ]
        .into_iter()
        .filter(|(_, contribution)| *contribution > 0.0)
        .map(|(kind, contribution)| ContributingFactor { kind, contribution })
        .collect();

        if classification.partial {
            contributing_factors.push(ContributingFactor {
                kind: FactorKind::PartialWindow,
                contribution: 0.0,
            });
        }

        contributing_factors.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

        let computed_tier = self.config.thresholds.tier_for(risk_score);
        let critical_latched = history.critical_latched || computed_tier == RiskTier::Critical;
        let risk_tier = if critical_latched {
            computed_tier.max(RiskTier::High)
        } else {
            computed_tier
        };

        RiskAssessment {
            risk_score,
            risk_tier,
            computed_tier,
            contributing_factors,
            context_unavailable: *context == RiskContext::Unavailable,
            critical_latched,
        }
    }

    /// Fatigue proxy: drop in mean technique between the older and newer
    /// halves of the recent trend, 0 when fewer than three samples exist.
    pub fn fatigue(&self, previous: &[f32], current: f32) -> f32 {
        let window = self.config.trend_window.max(3);
        let mut samples: Vec<f32> = previous.to_vec();
        samples.push(current);
        if samples.len() > window {
            samples.drain(..samples.len() - window);
        }
        if samples.len() < 3 {
            return 0.0;
        }

        let split = samples.len() / 2;
        let mean = |values: &[f32]| values.iter().sum::<f32>() / values.len() as f32;
        let decline = mean(&samples[..split]) - mean(&samples[split..]);

        (decline / 0.5).clamp(0.0, 1.0)
    }

    pub fn multiplier(&self, factors: &RiskFactors) -> f32 {
        let derived = match factors.multiplier_override {
            Some(value) if value.is_finite() => value,
            _ => {
                let mut value = 1.0;
                if factors.prior_injury {
                    value += self.config.prior_injury_weight;
                }
                if factors.recent_return_from_injury {
                    value += self.config.recent_return_weight;
                }
                if factors.hypermobility {
                    value += self.config.hypermobility_weight;
                }
                value
            }
        };
        derived.clamp(1.0, self.config.max_multiplier.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(label: MovementLabel, technique: f32) -> ClassificationResult {
        ClassificationResult {
            window_sequence: 1,
            label,
            label_confidence: 0.9,
            technique_score: technique,
            partial: false,
        }
    }

    fn assess(estimator: &RiskEstimator, label: MovementLabel, technique: f32) -> RiskAssessment {
        estimator.assess(
            &classification(label, technique),
            &RiskHistory::default(),
            &RiskContext::NotRequested,
        )
    }

    #[test]
    fn test_good_plank_is_low() {
        let assessment = assess(&RiskEstimator::default(), MovementLabel::Plank, 0.95);
        // 0.5 * 0.05 + 0.3 * 0.1 = 0.055
        assert!((assessment.risk_score - 0.055).abs() < 1e-5);
        assert_eq!(assessment.risk_tier, RiskTier::Low);
    }

    #[test]
    fn test_landing_outweighs_hold_at_same_technique() {
        let estimator = RiskEstimator::default();
        let landing = assess(&estimator, MovementLabel::JumpLanding, 0.6);
        let hold = assess(&estimator, MovementLabel::Plank, 0.6);
        assert!(landing.risk_score > hold.risk_score);
        assert_eq!(landing.risk_tier, RiskTier::Moderate);
    }

    #[test]
    fn test_unknown_uses_its_own_row() {
        let assessment = assess(&RiskEstimator::default(), MovementLabel::Unknown, 0.8);
        // 0.5 * 0.2 + 0.3 * 0.45 = 0.235
        assert!((assessment.risk_score - 0.235).abs() < 1e-5);
        assert!(assessment
            .contributing_factors
            .iter()
            .any(|f| f.kind == FactorKind::UnknownMovement));
        assert!(!assessment
            .contributing_factors
            .iter()
            .any(|f| f.kind == FactorKind::MovementBaseRisk));
    }

    #[test]
    fn test_tier_thresholds() {
        let thresholds = RiskConfig::default().thresholds;
        assert_eq!(thresholds.tier_for(0.0), RiskTier::Low);
        assert_eq!(thresholds.tier_for(0.2499), RiskTier::Low);
        assert_eq!(thresholds.tier_for(0.25), RiskTier::Moderate);
        assert_eq!(thresholds.tier_for(0.5), RiskTier::High);
        assert_eq!(thresholds.tier_for(0.75), RiskTier::Critical);
        assert_eq!(thresholds.tier_for(1.0), RiskTier::Critical);
    }

    #[test]
    fn test_custom_thresholds_change_sensitivity() {
        let mut config = RiskConfig::default();
        config.thresholds.high = 0.3;
        let assessment = assess(&RiskEstimator::new(config), MovementLabel::Squat, 0.6);
        // 0.5 * 0.4 + 0.3 * 0.3 = 0.29 -> still moderate
        assert_eq!(assessment.risk_tier, RiskTier::Moderate);
        let worse = assess(
            &RiskEstimator::new(RiskConfig {
                thresholds: crate::risk::config::RiskThresholds {
                    moderate: 0.1,
                    high: 0.2,
                    critical: 0.9,
                },
                ..RiskConfig::default()
            }),
            MovementLabel::Squat,
            0.6,
        );
        assert_eq!(worse.risk_tier, RiskTier::High);
    }

    #[test]
    fn test_fatigue_from_declining_technique() {
        let estimator = RiskEstimator::default();
        assert_eq!(estimator.fatigue(&[0.9], 0.5), 0.0);
        assert_eq!(estimator.fatigue(&[0.5, 0.6, 0.7], 0.8), 0.0);

        // Older half 0.9, newer half 0.6 -> 0.3 / 0.5
        let fatigue = estimator.fatigue(&[0.9, 0.9, 0.9, 0.6, 0.6], 0.6);
        assert!((fatigue - 0.6).abs() < 1e-5);

        // Only the last six samples count.
        let fatigue = estimator.fatigue(&[0.1, 0.1, 0.9, 0.9, 0.9, 0.6, 0.6], 0.6);
        assert!((fatigue - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_student_history_multiplier() {
        let estimator = RiskEstimator::default();
        let factors = RiskFactors {
            prior_injury: true,
            recent_return_from_injury: true,
            ..RiskFactors::default()
        };
        assert!((estimator.multiplier(&factors) - 1.35).abs() < 1e-5);

        let capped = RiskFactors {
            multiplier_override: Some(3.0),
            ..RiskFactors::default()
        };
        assert_eq!(estimator.multiplier(&capped), 1.6);

        let with_context = estimator.assess(
            &classification(MovementLabel::Squat, 0.6),
            &RiskHistory::default(),
            &RiskContext::Factors(factors),
        );
        let without = assess(&estimator, MovementLabel::Squat, 0.6);
        assert!((with_context.risk_score - without.risk_score * 1.35).abs() < 1e-5);
        assert_eq!(with_context.contributing_factors.len(), 3);
        assert!(!with_context.context_unavailable);
    }

    #[test]
    fn test_unavailable_context_is_flagged() {
        let assessment = RiskEstimator::default().assess(
            &classification(MovementLabel::Squat, 0.6),
            &RiskHistory::default(),
            &RiskContext::Unavailable,
        );
        assert!(assessment.context_unavailable);
        assert!((assessment.risk_score - 0.29).abs() < 1e-5);
    }

    #[test]
    fn test_critical_latch_floors_reported_tier() {
        let estimator = RiskEstimator::default();
        // 0.5 + 0.3 * 0.6 + 0.2 * full fatigue = 0.88
        let critical = estimator.assess(
            &classification(MovementLabel::JumpLanding, 0.0),
            &RiskHistory {
                recent_technique: &[1.0, 1.0],
                critical_latched: false,
            },
            &RiskContext::NotRequested,
        );
        assert_eq!(critical.computed_tier, RiskTier::Critical);
        assert!(critical.critical_latched);

        let after = estimator.assess(
            &classification(MovementLabel::Plank, 1.0),
            &RiskHistory {
                recent_technique: &[0.0],
                critical_latched: true,
            },
            &RiskContext::NotRequested,
        );
        assert_eq!(after.computed_tier, RiskTier::Low);
        assert_eq!(after.risk_tier, RiskTier::High);
    }

    #[test]
    fn test_factors_sorted_by_contribution() {
        let assessment = assess(&RiskEstimator::default(), MovementLabel::Squat, 0.2);
        let contributions: Vec<f32> = assessment
            .contributing_factors
            .iter()
            .map(|f| f.contribution)
            .collect();
        let mut sorted = contributions.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(contributions, sorted);
        assert_eq!(assessment.contributing_factors[0].kind, FactorKind::PoorTechnique);
    }
}
