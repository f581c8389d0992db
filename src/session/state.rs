//! Per-session pipeline state and its lifecycle.
//!
//! `AnalysisSession` is synchronous and owns everything one session mutates:
//! landmark memory, the sequence buffer, the risk trend and latch, the
//! feedback gate and the aggregate. The manager drives it under a
//! per-session lock and does the async work (inference, sinks, storage)
//! around it.

use chrono::{DateTime, Utc};

use crate::buffer::{BufferConfig, SequenceBuffer};
use crate::classifier::{ClassifiedWindow, ModelError, MovementClassifier};
use crate::error::{PipelineError, PipelineResult};
use crate::features::{FeatureAdapter, LandmarkMemory};
use crate::feedback::{compose, FeedbackEmitter};
use crate::models::{
    ClassificationResult, FeedbackEvent, FrameObservation, RiskAssessment, SequenceWindow,
    SessionAggregate, SessionResult, SessionSnapshot, SessionStatus,
};
use crate::risk::{RiskContext, RiskEstimator, RiskHistory};
use crate::settings::PipelineSettings;

/// What happened to one classified window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReport {
    pub classification: ClassificationResult,
    pub assessment: RiskAssessment,
    /// Event that passed the feedback gate, if any.
    pub feedback: Option<FeedbackEvent>,
}

/// Result of pushing one frame through adapter and buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Rejected(PipelineError),
    Buffered {
        degraded: bool,
        invalidated: Option<PipelineError>,
        ready: Option<SequenceWindow>,
    },
}

pub struct AnalysisSession {
    id: String,
    student_id: Option<String>,
    status: SessionStatus,
    started_at: Option<DateTime<Utc>>,

    adapter: FeatureAdapter,
    memory: LandmarkMemory,
    buffer: SequenceBuffer,
    classifier: Option<MovementClassifier>,
    estimator: RiskEstimator,
    risk_context: RiskContext,
    emitter: FeedbackEmitter,
    settings: PipelineSettings,

    /// Technique scores of the most recent windows, oldest first.
    technique_trend: Vec<f32>,
    critical_latched: bool,
    consecutive_failures: u32,
    last_assessment: Option<RiskAssessment>,
    aggregate: SessionAggregate,

    result: Option<SessionResult>,
}

impl AnalysisSession {
    pub fn new(id: String, student_id: Option<String>, settings: PipelineSettings) -> Self {
        Self {
            adapter: FeatureAdapter::new(settings.adapter.clone()),
            memory: LandmarkMemory::new(),
            buffer: SequenceBuffer::new(settings.buffer.clone()),
            classifier: None,
            estimator: RiskEstimator::new(settings.risk.clone()),
            risk_context: RiskContext::NotRequested,
            emitter: FeedbackEmitter::new(id.clone(), settings.feedback.clone()),
            settings,
            technique_trend: Vec::new(),
            critical_latched: false,
            consecutive_failures: 0,
            last_assessment: None,
            aggregate: SessionAggregate::default(),
            result: None,
            id,
            student_id,
            status: SessionStatus::Created,
            started_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn buffer_config(&self) -> &BufferConfig {
        self.buffer.config()
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    pub fn aggregate(&self) -> &SessionAggregate {
        &self.aggregate
    }

    pub fn critical_latched(&self) -> bool {
        self.critical_latched
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn classifier(&self) -> Option<&MovementClassifier> {
        self.classifier.as_ref()
    }

    /// Finalized result, once the session is COMPLETED or FAILED.
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn ensure_status(&self, operation: &'static str, expected: SessionStatus) -> PipelineResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(PipelineError::session_state(operation, self.status))
        }
    }

    /// CREATED → ACTIVE with the injected classifier and the student context
    /// that was read for this session.
    pub fn start(&mut self, classifier: MovementClassifier, context: RiskContext) -> PipelineResult<()> {
        self.ensure_status("start", SessionStatus::Created)?;
        self.classifier = Some(classifier);
        self.risk_context = context;
        self.started_at = Some(Utc::now());
        self.status = SessionStatus::Active;
        Ok(())
    }

    pub fn pause(&mut self) -> PipelineResult<()> {
        self.ensure_status("pause", SessionStatus::Active)?;
        self.status = SessionStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> PipelineResult<()> {
        self.ensure_status("resume", SessionStatus::Paused)?;
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// Adapter then buffer. Rejected or out-of-order frames leave the
    /// landmark memory and the buffer untouched.
    pub fn ingest(&mut self, frame: &FrameObservation) -> PipelineResult<Ingested> {
        self.ensure_status("submit frame to", SessionStatus::Active)?;
        self.aggregate.frames_received += 1;

        let adapted = match self.adapter.adapt(frame, &self.memory) {
            Ok(adapted) => adapted,
            Err(err) => {
                self.aggregate.frames_rejected += 1;
                return Ok(Ingested::Rejected(err));
            }
        };

        let outcome = self
            .buffer
            .append(adapted.features, adapted.timestamp_ms, adapted.degraded);

        if !outcome.accepted {
            self.aggregate.frames_rejected += 1;
            let reason = match self.buffer.last_timestamp() {
                Some(last) if frame.timestamp_ms <= last => {
                    format!("timestamp not after previous frame at {last}ms")
                }
                _ => "feature vector not finite".to_string(),
            };
            return Ok(Ingested::Rejected(PipelineError::InputRejected {
                timestamp_ms: frame.timestamp_ms,
                reason,
            }));
        }

        self.memory.absorb(&adapted);
        self.aggregate.frames_admitted += 1;
        if adapted.degraded {
            self.aggregate.frames_degraded += 1;
        }

        let invalidated = outcome.invalidated.map(|gap| {
            self.aggregate.windows_invalidated += 1;
            PipelineError::WindowInvalidated {
                gap_ms: gap.gap_ms,
                max_gap_ms: self.buffer.config().max_gap_ms,
                discarded: gap.discarded,
            }
        });

        Ok(Ingested::Buffered {
            degraded: adapted.degraded,
            invalidated,
            ready: outcome.ready,
        })
    }

    /// Risk, aggregate and feedback for a successfully classified window.
    pub fn record_classification(&mut self, classified: ClassifiedWindow, timestamp_ms: u64) -> WindowReport {
        self.consecutive_failures = 0;
        let ClassifiedWindow { result, summary } = classified;

        let history = RiskHistory {
            recent_technique: &self.technique_trend,
            critical_latched: self.critical_latched,
        };
        let assessment = self.estimator.assess(&result, &history, &self.risk_context);

        let trend_window = self.settings.risk.trend_window.max(1);
        self.technique_trend.push(result.technique_score);
        if self.technique_trend.len() > trend_window {
            let excess = self.technique_trend.len() - trend_window;
            self.technique_trend.drain(..excess);
        }
        self.critical_latched = assessment.critical_latched;
        self.aggregate.record_window(&result, &assessment);

        let feedback = compose(&result, &assessment, &summary, &self.settings.feedback)
            .and_then(|candidate| self.emitter.offer(candidate, timestamp_ms).event());

        self.last_assessment = Some(assessment.clone());

        WindowReport {
            classification: result,
            assessment,
            feedback,
        }
    }

    /// Count a failed window. Returns the error to surface, escalated once
    /// the consecutive budget is spent.
    pub fn record_failure(&mut self, error: &ModelError) -> PipelineError {
        self.consecutive_failures += 1;
        self.aggregate.windows_failed += 1;
        PipelineError::ClassificationFailure {
            reason: error.to_string(),
            consecutive: self.consecutive_failures,
            escalated: self.consecutive_failures >= self.settings.session.max_consecutive_failures,
        }
    }

    /// Remaining unclassified frames as a partial window, for completion.
    pub fn flush(&mut self) -> Option<SequenceWindow> {
        self.buffer.flush()
    }

    pub fn acknowledge_critical(&mut self) -> bool {
        std::mem::replace(&mut self.critical_latched, false)
    }

    /// Move to a terminal status and build the result handed to storage.
    /// Buffered frames are discarded. A second call returns the first result.
    pub fn finalize(&mut self, status: SessionStatus, failure_reason: Option<String>) -> SessionResult {
        if let Some(result) = &self.result {
            return result.clone();
        }

        self.status = status;
        self.buffer.clear();
        self.memory.clear();

        let result = SessionResult {
            session_id: self.id.clone(),
            student_id: self.student_id.clone(),
            status,
            started_at: self.started_at,
            ended_at: Utc::now(),
            complete: status == SessionStatus::Completed,
            failure_reason,
            model_name: self.classifier.as_ref().map(|c| c.model_name().to_string()),
            context_unavailable: self.risk_context == RiskContext::Unavailable,
            aggregate: self.aggregate.clone(),
        };
        self.result = Some(result.clone());
        result
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            status: self.status,
            started_at: self.started_at,
            buffered_frames: self.buffer.len(),
            consecutive_failures: self.consecutive_failures,
            critical_latched: self.critical_latched,
            last_assessment: self.last_assessment.clone(),
            aggregate: self.aggregate.clone(),
        }
    }
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("buffered", &self.buffer.len())
            .field("critical_latched", &self.critical_latched)
            .finish()
    }
}
