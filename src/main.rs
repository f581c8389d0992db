//! Demo runner: two synthetic students squatting in parallel sessions,
//! through the full pipeline into SQLite.
//!
//! Environment:
//! - `MOVESAFE_SETTINGS`: path of a JSON settings file (optional)
//! - `MOVESAFE_DB`: SQLite path, defaults to `movesafe.sqlite3` in the temp dir
//! - `MOVESAFE_DEBUG=1`: debug logging

use std::{f32::consts::PI, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::Mutex;

use movesafe::{
    classifier::RuleBasedModel,
    interfaces::LogFeedbackSink,
    models::{joints, FrameObservation, Landmark, RiskFactors},
    Database, PipelineSettings, PoseEvent, PoseSource, SessionManager, SessionWorker,
    SettingsStore,
};

const FPS: u64 = 30;
const FRAME_MS: u64 = 1_000 / FPS;
const SQUAT_PERIOD_MS: f32 = 2_400.0;

/// Side-view squat generator. Form degrades over the set for a fatiguing
/// student, and one dropout leaves a gap in the stream.
struct SyntheticSquatSource {
    state: Mutex<SyntheticState>,
    total_frames: u64,
    fatigue_rate: f32,
    gap_at: Option<u64>,
}

struct SyntheticState {
    rng: StdRng,
    frame: u64,
    timestamp_ms: u64,
}

impl SyntheticSquatSource {
    fn new(seed: u64, total_frames: u64, fatigue_rate: f32, gap_at: Option<u64>) -> Self {
        Self {
            state: Mutex::new(SyntheticState {
                rng: StdRng::seed_from_u64(seed),
                frame: 0,
                timestamp_ms: 0,
            }),
            total_frames,
            fatigue_rate,
            gap_at,
        }
    }
}

#[async_trait]
impl PoseSource for SyntheticSquatSource {
    async fn next_frame(&self, _session_id: &str) -> Result<PoseEvent> {
        let mut state = self.state.lock().await;
        if state.frame >= self.total_frames {
            return Ok(PoseEvent::EndOfStream);
        }

        let frame_index = state.frame;
        state.frame += 1;
        state.timestamp_ms += if Some(frame_index) == self.gap_at { 900 } else { FRAME_MS };
        let timestamp_ms = state.timestamp_ms;

        let depth = 0.5 * (1.0 - (2.0 * PI * timestamp_ms as f32 / SQUAT_PERIOD_MS).cos());
        let fatigue = (frame_index as f32 * self.fatigue_rate).min(1.0);
        let lean = depth * (0.05 + 0.2 * fatigue);

        let rng = &mut state.rng;
        let mut jitter = || rng.gen_range(-0.004f32..0.004);

        let ankle = (0.50, 0.95);
        let knee = (0.50 + 0.12 * depth, 0.78 + 0.03 * depth);
        let hip = (0.50 - 0.14 * depth, 0.60 + 0.16 * depth);
        let shoulder = (hip.0 + 0.05 - lean, hip.1 - 0.30 + 0.05 * depth);
        let elbow = (shoulder.0 + 0.10, shoulder.1 + 0.10);
        let wrist = (shoulder.0 + 0.20, shoulder.1 + 0.10);

        let mut landmarks = Vec::with_capacity(12);
        for (side, offset) in [(0usize, -0.02f32), (1, 0.02)] {
            let pick = |left: u32, right: u32| if side == 0 { left } else { right };
            for (id, (x, y)) in [
                (pick(joints::LEFT_SHOULDER, joints::RIGHT_SHOULDER), shoulder),
                (pick(joints::LEFT_ELBOW, joints::RIGHT_ELBOW), elbow),
                (pick(joints::LEFT_WRIST, joints::RIGHT_WRIST), wrist),
                (pick(joints::LEFT_HIP, joints::RIGHT_HIP), hip),
                (pick(joints::LEFT_KNEE, joints::RIGHT_KNEE), knee),
                (pick(joints::LEFT_ANKLE, joints::RIGHT_ANKLE), ankle),
            ] {
                landmarks.push(Landmark::new(id, x + offset + jitter(), y + jitter(), 0.0, 0.95));
            }
        }

        // Occasional occlusion of one wrist.
        if state.rng.gen_bool(0.05) {
            if let Some(wrist) = landmarks.iter_mut().find(|l| l.id == joints::RIGHT_WRIST) {
                wrist.confidence = 0.2;
            }
        }

        Ok(PoseEvent::Frame(FrameObservation::new(timestamp_ms, landmarks)))
    }
}

fn load_settings() -> Result<PipelineSettings> {
    match std::env::var_os("MOVESAFE_SETTINGS") {
        Some(path) => {
            let store = SettingsStore::new(PathBuf::from(path))?;
            info!("Loaded settings from {}", store.path().display());
            Ok(store.settings())
        }
        None => Ok(PipelineSettings::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    movesafe::init_logging();
    info!("movesafe demo starting up...");

    let settings = load_settings()?;
    let db_path = std::env::var_os("MOVESAFE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("movesafe.sqlite3"));
    let database = Database::new(db_path).context("failed to open result database")?;

    database
        .upsert_risk_factors(
            "student-b",
            &RiskFactors {
                prior_injury: true,
                injured_regions: vec!["right_knee".into()],
                ..RiskFactors::default()
            },
        )
        .await?;

    let manager = Arc::new(
        SessionManager::new(settings, Arc::new(database.clone()), Arc::new(LogFeedbackSink))
            .with_student_context(Arc::new(database.clone())),
    );

    let students = [
        ("student-a", SyntheticSquatSource::new(7, 300, 0.0, None)),
        ("student-b", SyntheticSquatSource::new(11, 300, 0.004, Some(180))),
    ];

    let mut workers = Vec::new();
    for (student_id, source) in students {
        let session_id = manager.create_session(Some(student_id.to_string())).await;
        manager
            .start(&session_id, Arc::new(RuleBasedModel::new()))
            .await?;
        workers.push(SessionWorker::spawn(manager.clone(), session_id, Arc::new(source)));
    }

    for worker in workers {
        let result = worker.join().await?;
        let aggregate = &result.aggregate;
        info!(
            "session {} ({}): {} | frames {}/{} admitted, {} windows, {} invalidated, mean technique {:.2}, max tier {}",
            result.session_id,
            result.student_id.as_deref().unwrap_or("anonymous"),
            result.status,
            aggregate.frames_admitted,
            aggregate.frames_received,
            aggregate.windows_classified,
            aggregate.windows_invalidated,
            aggregate.mean_technique_score.unwrap_or(0.0),
            aggregate
                .max_reported_tier
                .map(|tier| tier.as_str())
                .unwrap_or("NONE"),
        );
    }

    info!("Results stored in {}", database.path().display());
    Ok(())
}
