use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::buffer::BufferConfig;
use crate::classifier::ClassifierConfig;
use crate::features::AdapterConfig;
use crate::feedback::FeedbackConfig;
use crate::risk::RiskConfig;
use crate::session::SessionConfig;

/// Every tunable of the pipeline. Missing sections and fields fall back to
/// defaults, so a settings file only needs what it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub adapter: AdapterConfig,
    pub buffer: BufferConfig,
    pub classifier: ClassifierConfig,
    pub risk: RiskConfig,
    pub feedback: FeedbackConfig,
    pub session: SessionConfig,
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;

        if !unit.contains(&self.adapter.min_confidence) {
            bail!("adapter.min_confidence must be within [0, 1]");
        }
        if !unit.contains(&self.adapter.max_missing_ratio) {
            bail!("adapter.max_missing_ratio must be within [0, 1]");
        }

        let buffer = &self.buffer;
        if buffer.capacity < 2 {
            bail!("buffer.capacity must be at least 2");
        }
        if buffer.step == 0 || buffer.step > buffer.capacity {
            bail!("buffer.step must be within 1..=capacity ({})", buffer.capacity);
        }
        if buffer.min_flush_frames == 0 || buffer.min_flush_frames > buffer.capacity {
            bail!("buffer.min_flush_frames must be within 1..=capacity");
        }
        if buffer.max_gap_ms == 0 {
            bail!("buffer.max_gap_ms must be positive");
        }

        if !unit.contains(&self.classifier.confidence_floor) {
            bail!("classifier.confidence_floor must be within [0, 1]");
        }

        let risk = &self.risk;
        if !risk.thresholds.is_ordered() {
            bail!("risk.thresholds must satisfy 0 <= moderate < high < critical <= 1");
        }
        let weights = [risk.weights.technique, risk.weights.base, risk.weights.fatigue];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            bail!("risk.weights must be finite and non-negative");
        }
        if let Some((label, value)) = risk.base_risk.iter().find(|(_, value)| !unit.contains(*value)) {
            bail!("risk.base_risk[{}] = {} is outside [0, 1]", label.as_str(), value);
        }
        if risk.max_multiplier < 1.0 {
            bail!("risk.max_multiplier must be at least 1.0");
        }

        if !unit.contains(&self.feedback.correction_threshold) {
            bail!("feedback.correction_threshold must be within [0, 1]");
        }

        if self.session.max_consecutive_failures == 0 {
            bail!("session.max_consecutive_failures must be at least 1");
        }

        Ok(())
    }
}

/// JSON-backed settings file with an in-memory copy.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<PipelineSettings>,
}

impl SettingsStore {
    /// Load `path` if it exists, otherwise start from defaults. An existing
    /// file that fails to parse or validate is an error.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            read_settings(&path)?
        } else {
            PipelineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> PipelineSettings {
        self.read_guard().clone()
    }

    pub fn update(&self, settings: PipelineSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.write_guard();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Re-read the file, keeping the current settings if it is invalid.
    pub fn reload(&self) -> Result<()> {
        let data = read_settings(&self.path)?;
        *self.write_guard() = data;
        Ok(())
    }

    fn persist(&self, data: &PipelineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, PipelineSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, PipelineSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn read_settings(path: &Path) -> Result<PipelineSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;
    let settings: PipelineSettings = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(settings)
}
