//! Sliding temporal window over a session's feature vectors.
//!
//! Frames accumulate until the window reaches capacity, at which point a copy
//! is handed out and the oldest `step` frames are evicted, so consecutive
//! windows overlap by `capacity - step` frames. A gap larger than
//! `max_gap_ms` throws the partial window away instead of classifying it.

use std::collections::VecDeque;

use crate::models::{FeatureVector, SequenceWindow};

use super::config::BufferConfig;

#[derive(Debug, Clone)]
struct BufferedFrame {
    timestamp_ms: u64,
    features: FeatureVector,
    degraded: bool,
}

/// Partial window dropped because of a timing gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapInvalidation {
    pub gap_ms: u64,
    pub discarded: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    /// False when the input was malformed and state did not advance.
    pub accepted: bool,
    pub ready: Option<SequenceWindow>,
    pub invalidated: Option<GapInvalidation>,
}

impl AppendOutcome {
    fn refused() -> Self {
        Self {
            accepted: false,
            ready: None,
            invalidated: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SequenceBuffer {
    config: BufferConfig,
    frames: VecDeque<BufferedFrame>,
    last_timestamp: Option<u64>,
    /// Buffered frames not yet part of any ready window.
    unclassified: usize,
    next_sequence: u64,
    invalidations: u64,
}

impl SequenceBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            config,
            last_timestamp: None,
            unclassified: 0,
            next_sequence: 1,
            invalidations: 0,
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Append one frame. Never fails; malformed input leaves state untouched.
    pub fn append(&mut self, features: FeatureVector, timestamp_ms: u64, degraded: bool) -> AppendOutcome {
        if features.iter().any(|value| !value.is_finite()) {
            return AppendOutcome::refused();
        }

        if let Some(last) = self.last_timestamp {
            if timestamp_ms <= last {
                return AppendOutcome::refused();
            }
        }

        let mut invalidated = None;
        if let (Some(last), false) = (self.last_timestamp, self.frames.is_empty()) {
            let gap_ms = timestamp_ms - last;
            if gap_ms > self.config.max_gap_ms {
                invalidated = Some(GapInvalidation {
                    gap_ms,
                    discarded: self.frames.len(),
                });
                self.frames.clear();
                self.unclassified = 0;
                self.invalidations += 1;
            }
        }

        self.frames.push_back(BufferedFrame {
            timestamp_ms,
            features,
            degraded,
        });
        self.last_timestamp = Some(timestamp_ms);
        self.unclassified += 1;

        let capacity = self.config.capacity.max(1);
        let ready = if self.frames.len() >= capacity {
            let window = self.snapshot(false);
            let step = self.config.step.clamp(1, capacity);
            self.frames.drain(..step);
            self.unclassified = 0;
            Some(window)
        } else {
            None
        };

        AppendOutcome {
            accepted: true,
            ready,
            invalidated,
        }
    }

    /// Hand out leftover frames as a partial window for a final best-effort
    /// classification. Returns `None` when everything buffered was already
    /// covered by a ready window or too few frames remain. Empties the buffer.
    pub fn flush(&mut self) -> Option<SequenceWindow> {
        let window = if self.unclassified > 0 && self.frames.len() >= self.config.min_flush_frames.max(1) {
            Some(self.snapshot(true))
        } else {
            None
        };
        self.frames.clear();
        self.unclassified = 0;
        window
    }

    /// Discard everything buffered, keeping counters.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.unclassified = 0;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    pub fn windows_emitted(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_timestamp
    }

    fn snapshot(&mut self, partial: bool) -> SequenceWindow {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        SequenceWindow {
            sequence,
            frames: self.frames.iter().map(|frame| frame.features).collect(),
            start_ms: self.frames.front().map_or(0, |frame| frame.timestamp_ms),
            end_ms: self.frames.back().map_or(0, |frame| frame.timestamp_ms),
            degraded_frames: self.frames.iter().filter(|frame| frame.degraded).count(),
            partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FEATURE_COUNT;

    const FRAME_MS: u64 = 33;

    fn features(value: f32) -> FeatureVector {
        [value; FEATURE_COUNT]
    }

    fn buffer(capacity: usize) -> SequenceBuffer {
        SequenceBuffer::new(BufferConfig::with_capacity(capacity))
    }

    #[test]
    fn test_ninety_frames_yield_five_overlapping_windows() {
        let mut buffer = buffer(30);
        let mut windows = Vec::new();

        for i in 0..90u64 {
            let outcome = buffer.append(features(i as f32 / 100.0), i * FRAME_MS, false);
            assert!(outcome.accepted);
            if let Some(window) = outcome.ready {
                windows.push(window);
            }
        }

        assert_eq!(windows.len(), 5);
        let spans: Vec<(u64, u64)> = windows
            .iter()
            .map(|w| (w.start_ms / FRAME_MS, w.end_ms / FRAME_MS))
            .collect();
        assert_eq!(spans, vec![(0, 29), (15, 44), (30, 59), (45, 74), (60, 89)]);
        assert!(windows.iter().all(|w| w.len() == 30 && !w.partial));
        assert_eq!(buffer.invalidations(), 0);
    }

    #[test]
    fn test_gaps_within_tolerance_never_invalidate() {
        let mut buffer = buffer(30);
        let mut timestamp = 0;
        for i in 0..200u64 {
            // Irregular spacing, always within max_gap_ms.
            timestamp += 20 + (i * 37) % 480;
            let outcome = buffer.append(features(0.5), timestamp, false);
            assert!(outcome.invalidated.is_none());
        }
        assert_eq!(buffer.invalidations(), 0);
    }

    #[test]
    fn test_single_gap_invalidates_once_and_resumes() {
        let mut buffer = buffer(30);
        for i in 0..20u64 {
            buffer.append(features(0.5), i * FRAME_MS, false);
        }

        let resume_at = 19 * FRAME_MS + 501;
        let outcome = buffer.append(features(0.5), resume_at, false);
        assert_eq!(
            outcome.invalidated,
            Some(GapInvalidation {
                gap_ms: 501,
                discarded: 20
            })
        );
        assert_eq!(buffer.len(), 1);

        let mut ready = 0;
        for i in 1..30u64 {
            let outcome = buffer.append(features(0.5), resume_at + i * FRAME_MS, false);
            assert!(outcome.invalidated.is_none());
            if let Some(window) = outcome.ready {
                assert_eq!(window.start_ms, resume_at);
                ready += 1;
            }
        }
        assert_eq!(ready, 1);
        assert_eq!(buffer.invalidations(), 1);
    }

    #[test]
    fn test_exact_max_gap_is_not_a_gap() {
        let mut buffer = buffer(30);
        buffer.append(features(0.5), 0, false);
        let outcome = buffer.append(features(0.5), 500, false);
        assert!(outcome.invalidated.is_none());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_malformed_input_does_not_advance() {
        let mut buffer = buffer(30);
        buffer.append(features(0.5), 100, false);

        let stale = buffer.append(features(0.5), 100, false);
        assert!(!stale.accepted);

        let mut bad = features(0.5);
        bad[3] = f32::NAN;
        let nan = buffer.append(bad, 133, false);
        assert!(!nan.accepted);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last_timestamp(), Some(100));
    }

    #[test]
    fn test_flush_returns_unclassified_leftovers() {
        let mut buffer = buffer(30);
        for i in 0..12u64 {
            buffer.append(features(0.5), i * FRAME_MS, i % 4 == 0);
        }

        let window = buffer.flush().expect("partial window");
        assert!(window.partial);
        assert_eq!(window.len(), 12);
        assert_eq!(window.degraded_frames, 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_flush_skips_already_classified_overlap() {
        let mut buffer = buffer(30);
        for i in 0..30u64 {
            buffer.append(features(0.5), i * FRAME_MS, false);
        }
        // 15 overlap frames remain, all already classified.
        assert_eq!(buffer.len(), 15);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn test_flush_requires_minimum_frames() {
        let mut buffer = buffer(30);
        for i in 0..5u64 {
            buffer.append(features(0.5), i * FRAME_MS, false);
        }
        assert!(buffer.flush().is_none());
        assert!(buffer.is_empty());
    }
}
