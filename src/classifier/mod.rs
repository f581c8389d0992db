//! Movement classifier - window summary, pluggable model, confidence floor.

pub mod config;
pub mod model;
pub mod movement;
pub mod rules;
pub mod summary;

pub use config::ClassifierConfig;
pub use model::{ModelError, ModelScore, MovementModel};
pub use movement::{ClassifiedWindow, MovementClassifier};
pub use rules::RuleBasedModel;
pub use summary::WindowSummary;
