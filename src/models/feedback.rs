use serde::{Deserialize, Serialize};

use super::{MovementLabel, RiskTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackKind {
    Info,
    Correction,
    RiskAlert,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Info => "INFO",
            FeedbackKind::Correction => "CORRECTION",
            FeedbackKind::RiskAlert => "RISK_ALERT",
        }
    }
}

/// Consumer-facing content of a feedback event.
///
/// Only stable, discrete fields live here so that two windows saying the
/// same thing compare equal for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub code: String,
    pub message: String,
    pub movement: Option<MovementLabel>,
    pub tier: Option<RiskTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    pub session_id: String,
    pub timestamp_ms: u64,
    pub kind: FeedbackKind,
    pub payload: FeedbackPayload,
}

impl FeedbackEvent {
    pub fn is_critical(&self) -> bool {
        self.kind == FeedbackKind::RiskAlert && self.payload.tier == Some(RiskTier::Critical)
    }
}
