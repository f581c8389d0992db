//! Pose observations as delivered by the external landmark extractor.

use serde::{Deserialize, Serialize};

/// A single tracked body keypoint for one frame.
///
/// Coordinates are normalized image space (x, y in 0-1, z relative depth).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub confidence: f32,
}

impl Landmark {
    pub fn new(id: u32, x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self {
            id,
            x,
            y,
            z,
            confidence,
        }
    }

    pub fn point(&self) -> Point3 {
        Point3 {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.confidence.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One video frame's pose data. Timestamps are monotonic milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameObservation {
    pub timestamp_ms: u64,
    pub landmarks: Vec<Landmark>,
}

impl FrameObservation {
    pub fn new(timestamp_ms: u64, landmarks: Vec<Landmark>) -> Self {
        Self {
            timestamp_ms,
            landmarks,
        }
    }

    pub fn landmark(&self, id: u32) -> Option<&Landmark> {
        self.landmarks.iter().find(|landmark| landmark.id == id)
    }
}

/// BlazePose landmark indices for the joints the pipeline tracks.
pub mod joints {
    pub const LEFT_SHOULDER: u32 = 11;
    pub const RIGHT_SHOULDER: u32 = 12;
    pub const LEFT_ELBOW: u32 = 13;
    pub const RIGHT_ELBOW: u32 = 14;
    pub const LEFT_WRIST: u32 = 15;
    pub const RIGHT_WRIST: u32 = 16;
    pub const LEFT_HIP: u32 = 23;
    pub const RIGHT_HIP: u32 = 24;
    pub const LEFT_KNEE: u32 = 25;
    pub const RIGHT_KNEE: u32 = 26;
    pub const LEFT_ANKLE: u32 = 27;
    pub const RIGHT_ANKLE: u32 = 28;

    /// Joints that feed the feature vector, in slot order.
    pub const TRACKED: [u32; 12] = [
        LEFT_SHOULDER,
        RIGHT_SHOULDER,
        LEFT_ELBOW,
        RIGHT_ELBOW,
        LEFT_WRIST,
        RIGHT_WRIST,
        LEFT_HIP,
        RIGHT_HIP,
        LEFT_KNEE,
        RIGHT_KNEE,
        LEFT_ANKLE,
        RIGHT_ANKLE,
    ];

    /// Slot of a tracked joint inside [`TRACKED`].
    pub fn slot(id: u32) -> Option<usize> {
        TRACKED.iter().position(|tracked| *tracked == id)
    }
}
