use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive classifier failures tolerated before the session fails.
    pub max_consecutive_failures: u32,

    /// Upper bound on the student-context lookup at `start`.
    pub context_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            context_timeout_ms: 1_000,
        }
    }
}
