use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::{ClassifiedWindow, ModelError, MovementClassifier, MovementModel};
use crate::error::{PipelineError, PipelineResult};
use crate::interfaces::{FeedbackSink, ResultStore, StudentContext};
use crate::models::{
    FeedbackEvent, FrameObservation, SequenceWindow, SessionResult, SessionSnapshot, SessionStatus,
};
use crate::risk::RiskContext;
use crate::settings::PipelineSettings;

use super::state::{AnalysisSession, Ingested, WindowReport};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// What `submit_frame` did with one frame. Recoverable conditions are
/// reported here rather than as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Dropped before the buffer. Carries `InputRejected`.
    Rejected(PipelineError),
    /// Admitted; no window became ready. `invalidated` carries
    /// `WindowInvalidated` when this frame arrived after a gap.
    Buffered {
        degraded: bool,
        invalidated: Option<PipelineError>,
    },
    /// Admitted and completed a window that was classified and scored.
    Classified(Box<WindowReport>),
    /// Admitted and completed a window the model failed on. The window is
    /// skipped; the session stays active.
    ClassificationSkipped(PipelineError),
}

struct LiveSession {
    state: Mutex<AnalysisSession>,
    /// Fired by `abort` before it takes `state`, so inference awaited under
    /// the lock gives way instead of holding the abort back.
    abort: CancellationToken,
}

type SessionHandle = Arc<LiveSession>;

#[derive(Clone)]
enum SessionEntry {
    Live(SessionHandle),
    /// Finalized. The pipeline state is dropped and only the result stays,
    /// so repeated `complete`/`abort` calls keep returning it.
    Finalized(Arc<SessionResult>),
}

impl SessionEntry {
    fn live(self, operation: &'static str) -> PipelineResult<SessionHandle> {
        match self {
            SessionEntry::Live(handle) => Ok(handle),
            SessionEntry::Finalized(result) => Err(PipelineError::session_state(operation, result.status)),
        }
    }
}

/// Owns every session of one pipeline instance and drives frames through
/// them. Sessions are independent; each is mutated under its own lock.
pub struct SessionManager {
    settings: PipelineSettings,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    store: Arc<dyn ResultStore>,
    sink: Arc<dyn FeedbackSink>,
    context: Option<Arc<dyn StudentContext>>,
}

impl SessionManager {
    pub fn new(
        settings: PipelineSettings,
        store: Arc<dyn ResultStore>,
        sink: Arc<dyn FeedbackSink>,
    ) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
            store,
            sink,
            context: None,
        }
    }

    pub fn with_student_context(mut self, context: Arc<dyn StudentContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn create_session(&self, student_id: Option<String>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = AnalysisSession::new(session_id.clone(), student_id, self.settings.clone());
        let handle = Arc::new(LiveSession {
            state: Mutex::new(session),
            abort: CancellationToken::new(),
        });
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), SessionEntry::Live(handle));
        log_debug!("session {} created", session_id);
        session_id
    }

    /// Every known session id, finalized ones included until forgotten.
    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Sessions still holding pipeline state (not yet finalized).
    pub async fn live_sessions(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| matches!(entry, SessionEntry::Live(_)))
            .count()
    }

    /// Drop a finalized session from the registry, returning its result.
    pub async fn forget(&self, session_id: &str) -> PipelineResult<SessionResult> {
        let result = match self.entry(session_id).await? {
            SessionEntry::Finalized(result) => (*result).clone(),
            SessionEntry::Live(handle) => {
                let session = handle.state.lock().await;
                match session.result() {
                    Some(result) => result.clone(),
                    None => return Err(PipelineError::session_state("forget", session.status())),
                }
            }
        };
        self.sessions.write().await.remove(session_id);
        Ok(result)
    }

    /// CREATED → ACTIVE. Reads the student context once, bounded by the
    /// configured timeout; a failed or slow lookup only degrades risk.
    pub async fn start(&self, session_id: &str, model: Arc<dyn MovementModel>) -> PipelineResult<()> {
        let handle = self.entry(session_id).await?.live("start")?;
        let mut session = handle.state.lock().await;
        session.ensure_status("start", SessionStatus::Created)?;

        let context = match (session.student_id(), &self.context) {
            (Some(student_id), Some(provider)) => tokio::select! {
                biased;
                _ = handle.abort.cancelled() => {
                    return Err(PipelineError::session_state("start", SessionStatus::Failed));
                }
                context = self.lookup_context(student_id, provider.as_ref()) => context,
            },
            _ => RiskContext::NotRequested,
        };

        let classifier = MovementClassifier::new(
            model,
            self.settings.classifier.clone(),
            self.settings.buffer.capacity,
        );
        let model_name = classifier.model_name().to_string();
        session.start(classifier, context)?;

        log_info!("session {} started with model {}", session_id, model_name);
        Ok(())
    }

    pub async fn pause(&self, session_id: &str) -> PipelineResult<()> {
        let handle = self.entry(session_id).await?.live("pause")?;
        let result = handle.state.lock().await.pause();
        result
    }

    pub async fn resume(&self, session_id: &str) -> PipelineResult<()> {
        let handle = self.entry(session_id).await?.live("resume")?;
        let result = handle.state.lock().await.resume();
        result
    }

    /// Adapter → buffer → classifier → risk → aggregate → feedback, in order,
    /// for one frame. Only valid while ACTIVE.
    ///
    /// Returns `ClassificationFailure { escalated: true }` when this frame's
    /// window exhausted the failure budget; the session is FAILED and its
    /// partial aggregate has been persisted by then. An `abort` arriving
    /// during inference drops the window and yields a `SessionState` error.
    pub async fn submit_frame(&self, session_id: &str, frame: FrameObservation) -> PipelineResult<FrameOutcome> {
        let handle = self.entry(session_id).await?.live("submit frame to")?;
        if handle.abort.is_cancelled() {
            return Err(PipelineError::session_state("submit frame to", SessionStatus::Failed));
        }
        let mut session = handle.state.lock().await;

        let (degraded, invalidated, ready) = match session.ingest(&frame)? {
            Ingested::Rejected(err) => {
                log_debug!("session {}: {}", session_id, err);
                return Ok(FrameOutcome::Rejected(err));
            }
            Ingested::Buffered {
                degraded,
                invalidated,
                ready,
            } => (degraded, invalidated, ready),
        };

        if let Some(err) = &invalidated {
            log_warn!("session {}: {}", session_id, err);
        }

        let Some(window) = ready else {
            return Ok(FrameOutcome::Buffered { degraded, invalidated });
        };

        let classifier = match session.classifier() {
            Some(classifier) => classifier.clone(),
            None => return Err(PipelineError::session_state("classify in", session.status())),
        };

        let Some(outcome) = classify_unless_aborted(&handle.abort, &classifier, &window).await else {
            log_info!("session {}: window {} dropped, session is being aborted", session_id, window.sequence);
            return Err(PipelineError::session_state("submit frame to", SessionStatus::Failed));
        };

        match outcome {
            Ok(classified) => {
                let report = session.record_classification(classified, window.end_ms);
                if let Some(event) = report.feedback.clone() {
                    self.emit(event).await;
                }
                Ok(FrameOutcome::Classified(Box::new(report)))
            }
            Err(model_err) => {
                let err = session.record_failure(&model_err);
                if !err.is_terminal() {
                    log_warn!("session {}: window {} skipped: {}", session_id, window.sequence, err);
                    return Ok(FrameOutcome::ClassificationSkipped(err));
                }

                log_error!("session {}: failing after {}", session_id, err);
                let result = session.finalize(SessionStatus::Failed, Some(err.to_string()));
                self.retire(&result).await;
                if let Err(store_err) = self.persist(&result).await {
                    log_error!("session {}: {}", session_id, store_err);
                }
                Err(err)
            }
        }
    }

    /// ACTIVE/PAUSED → COMPLETED. Classifies whatever is still buffered as a
    /// partial window, then persists the result. Repeated calls on a
    /// finalized session return its result without touching storage.
    ///
    /// If that last window spends the failure budget the session ends FAILED
    /// instead and the escalated `ClassificationFailure` is returned.
    pub async fn complete(&self, session_id: &str) -> PipelineResult<SessionResult> {
        let handle = match self.entry(session_id).await? {
            SessionEntry::Finalized(result) => {
                log_debug!("session {} already finalized, complete is a no-op", session_id);
                return Ok((*result).clone());
            }
            SessionEntry::Live(handle) => handle,
        };
        let mut session = handle.state.lock().await;

        if let Some(result) = session.result() {
            return Ok(result.clone());
        }

        match session.status() {
            SessionStatus::Active | SessionStatus::Paused => {}
            status => return Err(PipelineError::session_state("complete", status)),
        }

        let mut escalation = None;
        if let (Some(window), Some(classifier)) = (session.flush(), session.classifier().cloned()) {
            match classify_unless_aborted(&handle.abort, &classifier, &window).await {
                None => return Err(PipelineError::session_state("complete", SessionStatus::Failed)),
                Some(Ok(classified)) => {
                    let report = session.record_classification(classified, window.end_ms);
                    log_debug!(
                        "session {}: final partial window {} labelled {}",
                        session_id,
                        window.sequence,
                        report.classification.label.as_str()
                    );
                    if let Some(event) = report.feedback {
                        self.emit(event).await;
                    }
                }
                Some(Err(model_err)) => {
                    let err = session.record_failure(&model_err);
                    if err.is_terminal() {
                        escalation = Some(err);
                    } else {
                        log_warn!("session {}: final partial window dropped: {}", session_id, err);
                    }
                }
            }
        }

        if let Some(err) = escalation {
            log_error!("session {}: failing after {}", session_id, err);
            let result = session.finalize(SessionStatus::Failed, Some(err.to_string()));
            self.retire(&result).await;
            if let Err(store_err) = self.persist(&result).await {
                log_error!("session {}: {}", session_id, store_err);
            }
            return Err(err);
        }

        let result = session.finalize(SessionStatus::Completed, None);
        self.retire(&result).await;
        log_info!(
            "session {} completed: {} windows, max tier {:?}",
            session_id,
            result.aggregate.windows_classified,
            result.aggregate.max_reported_tier
        );
        self.persist(&result).await?;
        Ok(result)
    }

    /// Any state → FAILED, discarding buffered frames. Does not wait for
    /// in-flight inference. Idempotent.
    pub async fn abort(&self, session_id: &str) -> PipelineResult<SessionResult> {
        let handle = match self.entry(session_id).await? {
            SessionEntry::Finalized(result) => return Ok((*result).clone()),
            SessionEntry::Live(handle) => handle,
        };

        handle.abort.cancel();
        let mut session = handle.state.lock().await;

        if let Some(result) = session.result() {
            return Ok(result.clone());
        }

        let discarded = session.buffered_frames();
        let result = session.finalize(SessionStatus::Failed, Some("aborted".into()));
        self.retire(&result).await;
        log_info!("session {} aborted, {} buffered frames discarded", session_id, discarded);
        self.persist(&result).await?;
        Ok(result)
    }

    /// Clear the sticky-critical latch. Returns whether it was set.
    pub async fn acknowledge_critical(&self, session_id: &str) -> PipelineResult<bool> {
        let handle = match self.entry(session_id).await? {
            SessionEntry::Finalized(_) => return Ok(false),
            SessionEntry::Live(handle) => handle,
        };
        let was_latched = handle.state.lock().await.acknowledge_critical();
        if was_latched {
            log_info!("session {}: critical risk acknowledged", session_id);
        }
        Ok(was_latched)
    }

    pub async fn snapshot(&self, session_id: &str) -> PipelineResult<SessionSnapshot> {
        match self.entry(session_id).await? {
            SessionEntry::Finalized(result) => Ok(result.snapshot()),
            SessionEntry::Live(handle) => {
                let snapshot = handle.state.lock().await.snapshot();
                Ok(snapshot)
            }
        }
    }

    pub async fn status(&self, session_id: &str) -> PipelineResult<SessionStatus> {
        match self.entry(session_id).await? {
            SessionEntry::Finalized(result) => Ok(result.status),
            SessionEntry::Live(handle) => {
                let status = handle.state.lock().await.status();
                Ok(status)
            }
        }
    }

    async fn entry(&self, session_id: &str) -> PipelineResult<SessionEntry> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| PipelineError::SessionNotFound(session_id.to_string()))
    }

    /// Swap a finalized session's slot for its result. A forgotten session
    /// stays forgotten.
    async fn retire(&self, result: &SessionResult) {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&result.session_id) {
            *entry = SessionEntry::Finalized(Arc::new(result.clone()));
        }
    }

    async fn lookup_context(&self, student_id: &str, provider: &dyn StudentContext) -> RiskContext {
        let timeout = Duration::from_millis(self.settings.session.context_timeout_ms);
        let failure = match tokio::time::timeout(timeout, provider.get_risk_factors(student_id)).await {
            Ok(Ok(factors)) => return RiskContext::Factors(factors),
            Ok(Err(err)) => PipelineError::ContextUnavailable(format!("{err:#}")),
            Err(_) => PipelineError::ContextUnavailable(format!(
                "lookup exceeded {}ms",
                self.settings.session.context_timeout_ms
            )),
        };
        log_warn!("student {}: {}", student_id, failure);
        RiskContext::Unavailable
    }

    async fn emit(&self, event: FeedbackEvent) {
        let session_id = event.session_id.clone();
        if let Err(err) = self.sink.emit(event).await {
            log_warn!("session {}: feedback sink failed: {err:#}", session_id);
        }
    }

    async fn persist(&self, result: &SessionResult) -> PipelineResult<()> {
        self.store
            .persist_session_result(result)
            .await
            .map_err(|err| PipelineError::Storage(format!("{err:#}")))
    }
}

/// Model call raced against the session's abort signal. `None` when the
/// session was aborted first; the blocking call is left to finish on its own.
async fn classify_unless_aborted(
    abort: &CancellationToken,
    classifier: &MovementClassifier,
    window: &SequenceWindow,
) -> Option<Result<ClassifiedWindow, ModelError>> {
    tokio::select! {
        biased;
        _ = abort.cancelled() => None,
        outcome = classifier.classify_blocking(window) => Some(outcome),
    }
}
