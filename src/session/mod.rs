//! Session lifecycle: the per-session state machine, the manager that owns
//! and drives sessions, and the optional ingestion worker.

pub mod config;
pub mod manager;
pub mod state;
pub mod worker;

pub use config::SessionConfig;
pub use manager::{FrameOutcome, SessionManager};
pub use state::{AnalysisSession, Ingested, WindowReport};
pub use worker::SessionWorker;
