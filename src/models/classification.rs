use serde::{Deserialize, Serialize};

/// Movement patterns the pipeline knows how to score.
///
/// `Unknown` is its own category: low-confidence windows are never folded
/// into a known movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementLabel {
    Squat,
    Lunge,
    JumpLanding,
    Plank,
    PushUp,
    Running,
    Unknown,
}

impl MovementLabel {
    pub const ALL: [MovementLabel; 7] = [
        MovementLabel::Squat,
        MovementLabel::Lunge,
        MovementLabel::JumpLanding,
        MovementLabel::Plank,
        MovementLabel::PushUp,
        MovementLabel::Running,
        MovementLabel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementLabel::Squat => "squat",
            MovementLabel::Lunge => "lunge",
            MovementLabel::JumpLanding => "jump_landing",
            MovementLabel::Plank => "plank",
            MovementLabel::PushUp => "push_up",
            MovementLabel::Running => "running",
            MovementLabel::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|label| label.as_str() == value)
    }
}

/// Classifier output for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub window_sequence: u64,
    pub label: MovementLabel,
    pub label_confidence: f32,
    pub technique_score: f32,
    /// Produced from a flushed, shorter-than-capacity window.
    pub partial: bool,
}
