use serde::{Deserialize, Serialize};

/// Windowing policy for the sequence buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Frames per classification window.
    pub capacity: usize,

    /// Frames evicted after each ready window; capacity / 2 gives 50% overlap.
    pub step: usize,

    /// A larger gap between consecutive frames discards the partial window.
    pub max_gap_ms: u64,

    /// Smallest leftover run worth a best-effort classification at completion.
    pub min_flush_frames: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::with_capacity(30)
    }
}

impl BufferConfig {
    /// Config with `step = capacity / 2` and the remaining defaults.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            step: (capacity / 2).max(1),
            max_gap_ms: 500,
            min_flush_frames: (capacity / 3).max(1),
        }
    }
}
