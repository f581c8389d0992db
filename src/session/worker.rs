use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::interfaces::{PoseEvent, PoseSource};
use crate::models::{SessionResult, SessionStatus};

use super::manager::{FrameOutcome, SessionManager};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Per-session ingestion task. Pulls frames from a pose source and feeds
/// them to the manager so producers never wait on inference.
pub struct SessionWorker {
    session_id: String,
    handle: Option<JoinHandle<Result<SessionResult>>>,
    cancel_token: CancellationToken,
}

impl SessionWorker {
    /// Spawn the loop for an already started session.
    pub fn spawn(manager: Arc<SessionManager>, session_id: String, source: Arc<dyn PoseSource>) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(ingest_loop(
            manager,
            session_id.clone(),
            source,
            cancel_token.clone(),
        ));

        Self {
            session_id,
            handle: Some(handle),
            cancel_token,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Wait for the stream to end and the session to be finalized.
    pub async fn join(mut self) -> Result<SessionResult> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("session worker already joined"))?;
        handle.await.context("session worker task failed to join")?
    }

    /// Cancel ingestion, aborting the session, and wait for the loop to exit.
    pub async fn stop(self) -> Result<SessionResult> {
        self.cancel_token.cancel();
        self.join().await
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel_token.cancel();
        }
    }
}

async fn ingest_loop(
    manager: Arc<SessionManager>,
    session_id: String,
    source: Arc<dyn PoseSource>,
    cancel_token: CancellationToken,
) -> Result<SessionResult> {
    let mut admitted = 0u64;

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("session {}: ingestion cancelled after {} frames", session_id, admitted);
                return finish(&manager, &session_id, Finish::Abort).await;
            }
            event = source.next_frame(&session_id) => event,
        };

        let frame = match event {
            Ok(PoseEvent::Frame(frame)) => frame,
            Ok(PoseEvent::EndOfStream) => {
                log_info!("session {}: end of stream after {} frames", session_id, admitted);
                return finish(&manager, &session_id, Finish::Complete).await;
            }
            Err(err) => {
                log_error!("session {}: pose source failed: {err:#}", session_id);
                return finish(&manager, &session_id, Finish::Abort).await;
            }
        };

        match manager.submit_frame(&session_id, frame).await {
            Ok(FrameOutcome::Rejected(_)) => {}
            Ok(_) => admitted += 1,
            Err(PipelineError::SessionState {
                status: SessionStatus::Paused,
                ..
            }) => {
                // Frames arriving while paused are dropped, not queued.
            }
            Err(err) => {
                log_warn!("session {}: worker stopping: {}", session_id, err);
                return finish(&manager, &session_id, Finish::Abort).await;
            }
        }
    }
}

enum Finish {
    Complete,
    Abort,
}

/// Finalize through the manager. Both paths are idempotent, so a session
/// already failed by escalation just returns its stored result.
async fn finish(manager: &SessionManager, session_id: &str, how: Finish) -> Result<SessionResult> {
    let result = match how {
        Finish::Complete => match manager.complete(session_id).await {
            // The session ended FAILED on the way; abort hands back that result.
            Err(err) if !matches!(err, PipelineError::Storage(_)) => {
                log_warn!("session {}: complete failed: {}", session_id, err);
                manager.abort(session_id).await
            }
            other => other,
        },
        Finish::Abort => manager.abort(session_id).await,
    };
    result.with_context(|| format!("failed to finalize session {session_id}"))
}
