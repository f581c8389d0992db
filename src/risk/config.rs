use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{MovementLabel, RiskTier};

/// Weights of the combined risk score. Expected to sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub technique: f32,
    pub base: f32,
    pub fatigue: f32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            technique: 0.5,
            base: 0.3,
            fatigue: 0.2,
        }
    }
}

/// Lower bounds of each tier above LOW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub moderate: f32,
    pub high: f32,
    pub critical: f32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate: 0.25,
            high: 0.5,
            critical: 0.75,
        }
    }
}

impl RiskThresholds {
    pub fn tier_for(&self, score: f32) -> RiskTier {
        if score < self.moderate {
            RiskTier::Low
        } else if score < self.high {
            RiskTier::Moderate
        } else if score < self.critical {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    pub fn is_ordered(&self) -> bool {
        0.0 <= self.moderate
            && self.moderate < self.high
            && self.high < self.critical
            && self.critical <= 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,

    /// Inherent risk of each movement, 0-1. Landing mechanics sit well above
    /// static holds; `Unknown` has its own conservative row.
    pub base_risk: BTreeMap<MovementLabel, f32>,

    /// Number of recent technique scores used for the fatigue proxy.
    pub trend_window: usize,

    /// Student history multiplier terms.
    pub prior_injury_weight: f32,
    pub recent_return_weight: f32,
    pub hypermobility_weight: f32,
    pub max_multiplier: f32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let base_risk = BTreeMap::from([
            (MovementLabel::Squat, 0.3),
            (MovementLabel::Lunge, 0.35),
            (MovementLabel::JumpLanding, 0.6),
            (MovementLabel::Plank, 0.1),
            (MovementLabel::PushUp, 0.2),
            (MovementLabel::Running, 0.35),
            (MovementLabel::Unknown, 0.45),
        ]);

        Self {
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            base_risk,
            trend_window: 6,
            prior_injury_weight: 0.2,
            recent_return_weight: 0.15,
            hypermobility_weight: 0.1,
            max_multiplier: 1.6,
        }
    }
}

impl RiskConfig {
    /// Base-risk row for a label. Labels missing from a customized table
    /// fall back to the `Unknown` row, never to zero.
    pub fn base_risk_for(&self, label: MovementLabel) -> f32 {
        self.base_risk
            .get(&label)
            .or_else(|| self.base_risk.get(&MovementLabel::Unknown))
            .copied()
            .unwrap_or(0.5)
    }
}
