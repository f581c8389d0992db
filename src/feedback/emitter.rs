use crate::models::FeedbackEvent;

use super::compose::FeedbackCandidate;
use super::config::FeedbackConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum EmitDecision {
    Emitted(FeedbackEvent),
    Duplicate,
    RateLimited { wait_ms: u64 },
}

impl EmitDecision {
    pub fn event(self) -> Option<FeedbackEvent> {
        match self {
            EmitDecision::Emitted(event) => Some(event),
            _ => None,
        }
    }
}

/// Per-session gate between composed candidates and the feedback sink.
///
/// Identical consecutive candidates are dropped, and non-critical events are
/// spaced at least `min_interval_ms` apart on frame time. Critical risk
/// alerts pass unconditionally.
#[derive(Debug)]
pub struct FeedbackEmitter {
    session_id: String,
    config: FeedbackConfig,
    last_emitted: Option<FeedbackCandidate>,
    last_emitted_at: Option<u64>,
    emitted: u64,
    suppressed: u64,
}

impl FeedbackEmitter {
    pub fn new(session_id: impl Into<String>, config: FeedbackConfig) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            last_emitted: None,
            last_emitted_at: None,
            emitted: 0,
            suppressed: 0,
        }
    }

    pub fn offer(&mut self, candidate: FeedbackCandidate, timestamp_ms: u64) -> EmitDecision {
        if !candidate.is_critical() {
            if self.last_emitted.as_ref() == Some(&candidate) {
                self.suppressed += 1;
                return EmitDecision::Duplicate;
            }

            if let Some(last_at) = self.last_emitted_at {
                let elapsed = timestamp_ms.saturating_sub(last_at);
                if elapsed < self.config.min_interval_ms {
                    self.suppressed += 1;
                    return EmitDecision::RateLimited {
                        wait_ms: self.config.min_interval_ms - elapsed,
                    };
                }
            }
        }

        let event = FeedbackEvent {
            session_id: self.session_id.clone(),
            timestamp_ms,
            kind: candidate.kind,
            payload: candidate.payload.clone(),
        };
        self.last_emitted = Some(candidate);
        self.last_emitted_at = Some(timestamp_ms);
        self.emitted += 1;
        EmitDecision::Emitted(event)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedbackKind, FeedbackPayload, MovementLabel, RiskTier};

    fn candidate(kind: FeedbackKind, code: &str, tier: Option<RiskTier>) -> FeedbackCandidate {
        FeedbackCandidate {
            kind,
            payload: FeedbackPayload {
                code: code.into(),
                message: format!("{code} message"),
                movement: Some(MovementLabel::Squat),
                tier,
            },
        }
    }

    #[test]
    fn test_consecutive_duplicate_is_dropped() {
        let mut emitter = FeedbackEmitter::new("s1", FeedbackConfig::default());
        let cue = candidate(FeedbackKind::Correction, "knees_caving", None);

        assert!(matches!(emitter.offer(cue.clone(), 0), EmitDecision::Emitted(_)));
        assert_eq!(emitter.offer(cue, 10_000), EmitDecision::Duplicate);
        assert_eq!(emitter.emitted(), 1);
        assert_eq!(emitter.suppressed(), 1);
    }

    #[test]
    fn test_non_critical_rate_limited_on_frame_time() {
        let mut emitter = FeedbackEmitter::new("s1", FeedbackConfig::default());
        emitter.offer(candidate(FeedbackKind::Info, "good_form", None), 1_000);

        let next = candidate(FeedbackKind::Correction, "hip_sag", None);
        assert_eq!(
            emitter.offer(next.clone(), 2_500),
            EmitDecision::RateLimited { wait_ms: 500 }
        );

        let event = emitter.offer(next, 3_000).event().unwrap();
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.timestamp_ms, 3_000);
        assert_eq!(event.payload.code, "hip_sag");
    }

    #[test]
    fn test_critical_bypasses_dedup_and_rate_limit() {
        let mut emitter = FeedbackEmitter::new("s1", FeedbackConfig::default());
        let alert = candidate(FeedbackKind::RiskAlert, "critical_risk", Some(RiskTier::Critical));

        for ts in [0, 100, 200] {
            let event = emitter.offer(alert.clone(), ts).event().unwrap();
            assert!(event.is_critical());
        }
        assert_eq!(emitter.emitted(), 3);
    }

    #[test]
    fn test_high_alert_is_rate_limited() {
        let mut emitter = FeedbackEmitter::new("s1", FeedbackConfig::default());
        emitter.offer(
            candidate(FeedbackKind::RiskAlert, "critical_risk", Some(RiskTier::Critical)),
            0,
        );
        let high = candidate(FeedbackKind::RiskAlert, "elevated_risk", Some(RiskTier::High));
        assert!(matches!(
            emitter.offer(high, 500),
            EmitDecision::RateLimited { .. }
        ));
    }
}
