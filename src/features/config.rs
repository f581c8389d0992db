use serde::{Deserialize, Serialize};

/// Tunable thresholds for the frame feature adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Landmarks below this confidence are treated as missing.
    pub min_confidence: f32,

    /// How old a remembered landmark may be and still fill a gap.
    pub staleness_ms: u64,

    /// Frames with a larger share of imputed or missing joints are rejected.
    pub max_missing_ratio: f32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            staleness_ms: 250,
            max_missing_ratio: 0.4,
        }
    }
}
