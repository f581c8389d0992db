use std::sync::Arc;

use crate::models::{ClassificationResult, MovementLabel, SequenceWindow};

use super::config::ClassifierConfig;
use super::model::{ModelError, ModelScore, MovementModel};
use super::summary::WindowSummary;

/// Classification plus the summary it was computed from, kept for feedback
/// cue selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedWindow {
    pub result: ClassificationResult,
    pub summary: WindowSummary,
}

/// Wraps an injected model with summary extraction, output validation and
/// the confidence floor. Holds no state between calls.
#[derive(Clone)]
pub struct MovementClassifier {
    model: Arc<dyn MovementModel>,
    config: ClassifierConfig,
    capacity: usize,
}

impl MovementClassifier {
    pub fn new(model: Arc<dyn MovementModel>, config: ClassifierConfig, capacity: usize) -> Self {
        Self {
            model,
            config,
            capacity,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn summarize(&self, window: &SequenceWindow) -> Result<WindowSummary, ModelError> {
        WindowSummary::from_window(window, self.capacity)
            .ok_or_else(|| ModelError::new(format!("window {} is empty", window.sequence)))
    }

    /// Classify on the calling thread.
    pub fn classify(&self, window: &SequenceWindow) -> Result<ClassifiedWindow, ModelError> {
        let summary = self.summarize(window)?;
        let score = self.model.score(&summary)?;
        self.interpret(window, summary, score)
    }

    /// Classify with the model call moved to the blocking pool, so a slow
    /// model never stalls the async runtime.
    pub async fn classify_blocking(
        &self,
        window: &SequenceWindow,
    ) -> Result<ClassifiedWindow, ModelError> {
        let summary = self.summarize(window)?;
        let model = Arc::clone(&self.model);
        let input = summary.clone();

        let score = tokio::task::spawn_blocking(move || model.score(&input))
            .await
            .map_err(|err| ModelError::new(format!("model worker join failed: {err}")))??;

        self.interpret(window, summary, score)
    }

    fn interpret(
        &self,
        window: &SequenceWindow,
        summary: WindowSummary,
        score: ModelScore,
    ) -> Result<ClassifiedWindow, ModelError> {
        if !score.confidence.is_finite() || !(0.0..=1.0).contains(&score.confidence) {
            return Err(ModelError::new(format!(
                "model returned confidence {} outside [0, 1]",
                score.confidence
            )));
        }
        if !score.technique_score.is_finite() || !(0.0..=1.0).contains(&score.technique_score) {
            return Err(ModelError::new(format!(
                "model returned technique score {} outside [0, 1]",
                score.technique_score
            )));
        }

        let confidence = if window.partial {
            score.confidence * summary.coverage
        } else {
            score.confidence
        };

        let label = if confidence < self.config.confidence_floor {
            MovementLabel::Unknown
        } else {
            score.label
        };

        Ok(ClassifiedWindow {
            result: ClassificationResult {
                window_sequence: window.sequence,
                label,
                label_confidence: confidence,
                technique_score: score.technique_score,
                partial: window.partial,
            },
            summary,
        })
    }
}

impl std::fmt::Debug for MovementClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovementClassifier")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FEATURE_COUNT;

    struct FixedModel(ModelScore);

    impl MovementModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _summary: &WindowSummary) -> Result<ModelScore, ModelError> {
            Ok(self.0)
        }
    }

    fn classifier(label: MovementLabel, confidence: f32, technique: f32) -> MovementClassifier {
        let model = FixedModel(ModelScore {
            label,
            confidence,
            technique_score: technique,
        });
        MovementClassifier::new(Arc::new(model), ClassifierConfig::default(), 30)
    }

    fn window(frames: usize, partial: bool) -> SequenceWindow {
        SequenceWindow {
            sequence: 7,
            frames: vec![[0.5; FEATURE_COUNT]; frames],
            start_ms: 0,
            end_ms: frames as u64 * 33,
            degraded_frames: 0,
            partial,
        }
    }

    #[test]
    fn test_confident_label_passes_through() {
        let result = classifier(MovementLabel::Squat, 0.9, 0.8)
            .classify(&window(30, false))
            .unwrap()
            .result;
        assert_eq!(result.label, MovementLabel::Squat);
        assert_eq!(result.window_sequence, 7);
        assert_eq!(result.technique_score, 0.8);
    }

    #[test]
    fn test_low_confidence_reports_unknown() {
        let result = classifier(MovementLabel::Squat, 0.3, 0.8)
            .classify(&window(30, false))
            .unwrap()
            .result;
        assert_eq!(result.label, MovementLabel::Unknown);
        assert_eq!(result.label_confidence, 0.3);
    }

    #[test]
    fn test_partial_window_scales_confidence() {
        let result = classifier(MovementLabel::Lunge, 0.9, 0.7)
            .classify(&window(15, true))
            .unwrap()
            .result;
        assert!(result.partial);
        assert!((result.label_confidence - 0.45).abs() < 1e-6);
        assert_eq!(result.label, MovementLabel::Lunge);

        let short = classifier(MovementLabel::Lunge, 0.9, 0.7)
            .classify(&window(10, true))
            .unwrap()
            .result;
        assert_eq!(short.label, MovementLabel::Unknown);
    }

    #[test]
    fn test_out_of_range_output_is_failure() {
        assert!(classifier(MovementLabel::Squat, 1.4, 0.5)
            .classify(&window(30, false))
            .is_err());
        assert!(classifier(MovementLabel::Squat, 0.9, f32::NAN)
            .classify(&window(30, false))
            .is_err());
    }

    #[test]
    fn test_empty_window_is_failure() {
        assert!(classifier(MovementLabel::Squat, 0.9, 0.5)
            .classify(&window(0, false))
            .is_err());
    }

    #[tokio::test]
    async fn test_blocking_pool_matches_inline() {
        let classifier = classifier(MovementLabel::Plank, 0.75, 0.6);
        let window = window(30, false);
        let inline = classifier.classify(&window).unwrap();
        let pooled = classifier.classify_blocking(&window).await.unwrap();
        assert_eq!(inline, pooled);
    }
}
