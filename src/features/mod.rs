//! Frame feature adapter - pose keypoints to fixed-size feature vectors.

pub mod adapter;
pub mod config;
pub mod geometry;

pub use adapter::{AdaptedFrame, FeatureAdapter, LandmarkMemory};
pub use config::AdapterConfig;
