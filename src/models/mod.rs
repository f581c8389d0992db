pub mod classification;
pub mod feedback;
pub mod frame;
pub mod risk;
pub mod session;
pub mod window;

pub use classification::{ClassificationResult, MovementLabel};
pub use feedback::{FeedbackEvent, FeedbackKind, FeedbackPayload};
pub use frame::{joints, FrameObservation, Landmark, Point3};
pub use risk::{ContributingFactor, FactorKind, RiskAssessment, RiskFactors, RiskTier};
pub use session::{SessionAggregate, SessionResult, SessionSnapshot, SessionStatus};
pub use window::{slots, FeatureVector, SequenceWindow, FEATURE_COUNT};
