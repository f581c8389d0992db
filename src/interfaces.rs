//! Collaborators the pipeline talks to but does not own, plus in-memory
//! implementations used by the demo binary and the tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::log_info;
use crate::models::{FeedbackEvent, FrameObservation, RiskFactors, SessionResult};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq)]
pub enum PoseEvent {
    Frame(FrameObservation),
    EndOfStream,
}

/// Upstream video/pose pipeline.
#[async_trait]
pub trait PoseSource: Send + Sync {
    async fn next_frame(&self, session_id: &str) -> Result<PoseEvent>;
}

/// Final session results. Called exactly once per session, at completion or
/// failure.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn persist_session_result(&self, result: &SessionResult) -> Result<()>;
}

#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn emit(&self, event: FeedbackEvent) -> Result<()>;
}

/// Optional source of per-student risk factors, read once at session start.
#[async_trait]
pub trait StudentContext: Send + Sync {
    async fn get_risk_factors(&self, student_id: &str) -> Result<RiskFactors>;
}

/// Result store that keeps everything in memory and counts calls per session.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<Vec<SessionResult>>,
    failing: AtomicBool,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent persist call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn results(&self) -> Vec<SessionResult> {
        self.results.lock().await.clone()
    }

    pub async fn persist_count(&self, session_id: &str) -> usize {
        self.results
            .lock()
            .await
            .iter()
            .filter(|result| result.session_id == session_id)
            .count()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn persist_session_result(&self, result: &SessionResult) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("result store unavailable");
        }
        self.results.lock().await.push(result.clone());
        Ok(())
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelFeedbackSink {
    sender: mpsc::UnboundedSender<FeedbackEvent>,
}

impl ChannelFeedbackSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedbackEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl FeedbackSink for ChannelFeedbackSink {
    async fn emit(&self, event: FeedbackEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| anyhow!("feedback receiver dropped"))
    }
}

#[derive(Debug, Default)]
pub struct CollectingFeedbackSink {
    events: Mutex<Vec<FeedbackEvent>>,
}

impl CollectingFeedbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<FeedbackEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl FeedbackSink for CollectingFeedbackSink {
    async fn emit(&self, event: FeedbackEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedbackSink;

#[async_trait]
impl FeedbackSink for LogFeedbackSink {
    async fn emit(&self, event: FeedbackEvent) -> Result<()> {
        log_info!(
            "[{}] {}ms {} {}: {}",
            event.session_id,
            event.timestamp_ms,
            event.kind.as_str(),
            event.payload.code,
            event.payload.message
        );
        Ok(())
    }
}

/// Fixed risk factors per student. Unknown students get defaults; an
/// unavailable context fails every lookup.
#[derive(Debug, Default, Clone)]
pub struct StaticStudentContext {
    factors: HashMap<String, RiskFactors>,
    unavailable: bool,
    delay: Option<Duration>,
}

impl StaticStudentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_student(mut self, student_id: impl Into<String>, factors: RiskFactors) -> Self {
        self.factors.insert(student_id.into(), factors);
        self
    }

    /// Delay every lookup, to exercise start-up timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl StudentContext for StaticStudentContext {
    async fn get_risk_factors(&self, student_id: &str) -> Result<RiskFactors> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            bail!("student context service unreachable");
        }
        Ok(self.factors.get(student_id).cloned().unwrap_or_default())
    }
}

/// Replays a fixed list of frames, then reports end of stream forever.
#[derive(Debug, Default)]
pub struct VecPoseSource {
    frames: Mutex<VecDeque<FrameObservation>>,
}

impl VecPoseSource {
    pub fn new(frames: impl IntoIterator<Item = FrameObservation>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
        }
    }

    pub async fn remaining(&self) -> usize {
        self.frames.lock().await.len()
    }
}

#[async_trait]
impl PoseSource for VecPoseSource {
    async fn next_frame(&self, _session_id: &str) -> Result<PoseEvent> {
        Ok(match self.frames.lock().await.pop_front() {
            Some(frame) => PoseEvent::Frame(frame),
            None => PoseEvent::EndOfStream,
        })
    }
}
