use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Label confidence below this is reported as `Unknown`.
    pub confidence_floor: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.4,
        }
    }
}
