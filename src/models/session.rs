//! Session-level data models: status, running aggregates and the final
//! result handed to storage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClassificationResult, MovementLabel, RiskAssessment, RiskTier};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Created,
    Active,
    Paused,
    Completed,
    Failed,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Created
    }
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "CREATED",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(SessionStatus::Created),
            "ACTIVE" => Some(SessionStatus::Active),
            "PAUSED" => Some(SessionStatus::Paused),
            "COMPLETED" => Some(SessionStatus::Completed),
            "FAILED" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running metrics accumulated over a session's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAggregate {
    pub frames_received: u64,
    pub frames_admitted: u64,
    pub frames_rejected: u64,
    pub frames_degraded: u64,
    pub windows_classified: u64,
    pub windows_failed: u64,
    pub windows_invalidated: u64,
    pub mean_technique_score: Option<f32>,
    /// Highest tier computed from any single window.
    pub max_risk_tier: Option<RiskTier>,
    /// Highest tier ever reported, including the sticky-critical floor.
    pub max_reported_tier: Option<RiskTier>,
    pub label_histogram: BTreeMap<MovementLabel, u32>,
    pub critical_reached: bool,
}

impl SessionAggregate {
    /// Fold one classified window into the aggregate.
    pub fn record_window(&mut self, classification: &ClassificationResult, assessment: &RiskAssessment) {
        self.windows_classified += 1;

        let count = self.windows_classified as f32;
        let previous = self.mean_technique_score.unwrap_or(0.0);
        self.mean_technique_score =
            Some(previous + (classification.technique_score - previous) / count);

        *self.label_histogram.entry(classification.label).or_insert(0) += 1;

        self.max_risk_tier = Some(
            self.max_risk_tier
                .map_or(assessment.computed_tier, |tier| tier.max(assessment.computed_tier)),
        );
        self.max_reported_tier = Some(
            self.max_reported_tier
                .map_or(assessment.risk_tier, |tier| tier.max(assessment.risk_tier)),
        );

        if assessment.computed_tier == RiskTier::Critical {
            self.critical_reached = true;
        }
    }

    /// Most frequently observed label, ties broken by label order.
    pub fn dominant_label(&self) -> Option<MovementLabel> {
        self.label_histogram
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| *label)
    }
}

/// Final aggregate persisted once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: String,
    pub student_id: Option<String>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    /// False for FAILED sessions: the aggregate covers only what ran.
    pub complete: bool,
    pub failure_reason: Option<String>,
    pub model_name: Option<String>,
    pub context_unavailable: bool,
    pub aggregate: SessionAggregate,
}

impl SessionResult {
    /// Snapshot of a finalized session. Nothing is buffered any more and the
    /// per-window state is gone.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            status: self.status,
            started_at: self.started_at,
            buffered_frames: 0,
            consecutive_failures: 0,
            critical_latched: false,
            last_assessment: None,
            aggregate: self.aggregate.clone(),
        }
    }
}

/// Live view of an open session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub buffered_frames: usize,
    pub consecutive_failures: u32,
    pub critical_latched: bool,
    pub last_assessment: Option<RiskAssessment>,
    pub aggregate: SessionAggregate,
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

    fn assessment(computed: RiskTier, reported: RiskTier) -> RiskAssessment {
        RiskAssessment {
            risk_score: 0.5,
            risk_tier: reported,
            computed_tier: computed,
            contributing_factors: Vec::new(),
            context_unavailable: false,
            critical_latched: reported != computed,
        }
    }

    #[test]
    fn running_mean_and_histogram() {
        let mut aggregate = SessionAggregate::default();
        aggregate.record_window(
            &classification(MovementLabel::Squat, 0.8),
            &assessment(RiskTier::Low, RiskTier::Low),
        );
        aggregate.record_window(
            &classification(MovementLabel::Squat, 0.4),
            &assessment(RiskTier::Moderate, RiskTier::Moderate),
        );
        aggregate.record_window(
            &classification(MovementLabel::Lunge, 0.6),
            &assessment(RiskTier::Low, RiskTier::Low),
        );

        assert_eq!(aggregate.windows_classified, 3);
        assert!((aggregate.mean_technique_score.unwrap() - 0.6).abs() < 1e-5);
        assert_eq!(aggregate.label_histogram[&MovementLabel::Squat], 2);
        assert_eq!(aggregate.dominant_label(), Some(MovementLabel::Squat));
        assert_eq!(aggregate.max_risk_tier, Some(RiskTier::Moderate));
    }

    #[test]
    fn reported_tier_tracks_sticky_floor() {
        let mut aggregate = SessionAggregate::default();
        aggregate.record_window(
            &classification(MovementLabel::JumpLanding, 0.1),
            &assessment(RiskTier::Critical, RiskTier::Critical),
        );
        aggregate.record_window(
            &classification(MovementLabel::JumpLanding, 0.9),
            &assessment(RiskTier::Low, RiskTier::High),
        );

        assert!(aggregate.critical_reached);
        assert_eq!(aggregate.max_reported_tier, Some(RiskTier::Critical));
    }
}
