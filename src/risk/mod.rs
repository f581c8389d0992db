//! Risk estimator - technique, movement base risk, fatigue and student
//! history combined into a tiered injury-risk score.

pub mod config;
pub mod estimator;

pub use config::{RiskConfig, RiskThresholds, RiskWeights};
pub use estimator::{RiskContext, RiskEstimator, RiskHistory};
