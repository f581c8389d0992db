//! Movement analysis and injury-risk pipeline.
//!
//! Timestamped pose frames for a session flow through
//! [`features`] → [`buffer`] → [`classifier`] → [`risk`] → [`feedback`],
//! orchestrated per session by [`session::SessionManager`]. Results are
//! handed to a [`interfaces::ResultStore`] exactly once per session.

pub mod buffer;
pub mod classifier;
pub mod db;
pub mod error;
pub mod features;
pub mod feedback;
pub mod interfaces;
pub mod models;
pub mod risk;
pub mod session;
pub mod settings;
pub mod utils;

pub use db::Database;
pub use error::{PipelineError, PipelineResult};
pub use interfaces::{FeedbackSink, PoseEvent, PoseSource, ResultStore, StudentContext};
pub use session::{FrameOutcome, SessionManager, SessionWorker};
pub use settings::{PipelineSettings, SettingsStore};
pub use utils::init_logging;
