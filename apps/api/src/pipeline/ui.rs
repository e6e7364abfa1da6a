use std::sync::Mutex;

use serde::Serialize;

use crate::pipeline::models::Candidate;

/// View-layer callbacks the coordinator fires as side effects.
pub trait PipelineUi: Send + Sync {
    fn open_interview_dialog(&self, candidate: &Candidate);
    fn open_disqualification_dialog(&self, candidate: &Candidate);
    fn open_temp_candidate_alert(&self, candidate: &Candidate, message: &str);
    fn open_conversion_flow(&self, candidate: &Candidate);
    /// A remote write failed and was rolled back.
    fn notify_failure(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum UiEffect {
    OpenInterviewDialog { candidate_id: String },
    OpenDisqualificationDialog { candidate_id: String },
    OpenTempCandidateAlert { candidate_id: String, message: String },
    OpenConversionFlow { candidate_id: String },
    Toast { message: String },
}

/// Collects effects so they can be returned to an HTTP caller.
#[derive(Debug, Default)]
pub struct RecordingUi {
    effects: Mutex<Vec<UiEffect>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, effect: UiEffect) {
        self.effects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(effect);
    }

    pub fn into_effects(self) -> Vec<UiEffect> {
        self.effects
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PipelineUi for RecordingUi {
    fn open_interview_dialog(&self, candidate: &Candidate) {
        self.push(UiEffect::OpenInterviewDialog {
            candidate_id: candidate.id.to_string(),
        });
    }

    fn open_disqualification_dialog(&self, candidate: &Candidate) {
        self.push(UiEffect::OpenDisqualificationDialog {
            candidate_id: candidate.id.to_string(),
        });
    }

    fn open_temp_candidate_alert(&self, candidate: &Candidate, message: &str) {
        self.push(UiEffect::OpenTempCandidateAlert {
            candidate_id: candidate.id.to_string(),
            message: message.to_string(),
        });
    }

    fn open_conversion_flow(&self, candidate: &Candidate) {
        self.push(UiEffect::OpenConversionFlow {
            candidate_id: candidate.id.to_string(),
        });
    }

    fn notify_failure(&self, message: &str) {
        self.push(UiEffect::Toast {
            message: message.to_string(),
        });
    }
}
