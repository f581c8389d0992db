use serde::{Deserialize, Serialize};

/// Discretized injury-risk bucket, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Critical,
}

impl Default for RiskTier {
    fn default() -> Self {
        RiskTier::Low
    }
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Moderate => "MODERATE",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(RiskTier::Low),
            "MODERATE" => Some(RiskTier::Moderate),
            "HIGH" => Some(RiskTier::High),
            "CRITICAL" => Some(RiskTier::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    PoorTechnique,
    MovementBaseRisk,
    Fatigue,
    StudentHistory,
    UnknownMovement,
    PartialWindow,
}

/// One term of the combined risk score and how much it added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub kind: FactorKind,
    pub contribution: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_score: f32,
    /// Tier reported to consumers, floored at HIGH while the critical latch holds.
    pub risk_tier: RiskTier,
    /// Tier derived from this window's score alone.
    pub computed_tier: RiskTier,
    pub contributing_factors: Vec<ContributingFactor>,
    pub context_unavailable: bool,
    pub critical_latched: bool,
}

/// Externally supplied student health context, read once per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskFactors {
    pub prior_injury: bool,
    pub recent_return_from_injury: bool,
    pub hypermobility: bool,
    pub injured_regions: Vec<String>,
    /// Replaces the derived multiplier when set.
    pub multiplier_override: Option<f32>,
}
