//! Stage/Status vocabulary — the closed set of pipeline stages, the per-stage
//! status sets, and the mapping to the system-of-record's stage identifiers.
//!
//! Statuses are a flat enum because several values (`Pending`, `Disqualified`)
//! appear in more than one stage; `StageStatus::new` is the only way to pair
//! one with a stage and rejects foreign combinations.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VocabularyError {
    #[error("status '{status}' is not part of the {stage} vocabulary")]
    ForeignStatus { stage: Stage, status: Status },

    #[error("stage {0} has no status concept")]
    StatusNotApplicable(Stage),
}

/// A hiring pipeline stage.
///
/// Declaration order matches the progress bar; `Disqualified` sits outside it.
/// Deserializes through `Stage::from_backend`, so backend ids, labels and
/// aliases are all accepted and unknown ids fall back to `FALLBACK_STAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Sourcing,
    Screening,
    ClientReview,
    Interview,
    Verification,
    Onboarding,
    Hired,
    Disqualified,
}

/// The ordered stages, as rendered by the progress bar.
pub const PIPELINE_ORDER: [Stage; 7] = [
    Stage::Sourcing,
    Stage::Screening,
    Stage::ClientReview,
    Stage::Interview,
    Stage::Verification,
    Stage::Onboarding,
    Stage::Hired,
];

pub const ALL_STAGES: [Stage; 8] = [
    Stage::Sourcing,
    Stage::Screening,
    Stage::ClientReview,
    Stage::Interview,
    Stage::Verification,
    Stage::Onboarding,
    Stage::Hired,
    Stage::Disqualified,
];

/// Stage used when the backend reports an identifier we do not recognise.
pub const FALLBACK_STAGE: Stage = Stage::Sourcing;

const SOURCING_STATUSES: &[Status] = &[
    Status::Pending,
    Status::ConnectionsSent,
    Status::ConnectionsAccepted,
    Status::CVReceived,
    Status::Disqualified,
];

const SCREENING_STATUSES: &[Status] = &[
    Status::AEMSInterview,
    Status::SubmissionPending,
    Status::CVSubmitted,
    Status::Disqualified,
];

const CLIENT_REVIEW_STATUSES: &[Status] = &[
    Status::Pending,
    Status::ClientShortlisted,
    Status::OnHold,
    Status::Disqualified,
];

const INTERVIEW_STATUSES: &[Status] = &[
    Status::InterviewScheduled,
    Status::InterviewCompleted,
    Status::FeedbackPending,
    Status::Selected,
    Status::Disqualified,
];

const VERIFICATION_STATUSES: &[Status] = &[
    Status::DocumentsPending,
    Status::BackgroundCheck,
    Status::ReferenceCheck,
    Status::Verified,
    Status::Disqualified,
];

const ONBOARDING_STATUSES: &[Status] = &[Status::Pending, Status::Completed];

const DISQUALIFIED_STATUSES: &[Status] = &[Status::Disqualified];

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Sourcing => "Sourcing",
            Stage::Screening => "Screening",
            Stage::ClientReview => "Client Review",
            Stage::Interview => "Interview",
            Stage::Verification => "Verification",
            Stage::Onboarding => "Onboarding",
            Stage::Hired => "Hired",
            Stage::Disqualified => "Disqualified",
        }
    }

    /// The system-of-record identifier for this stage.
    pub fn to_backend(&self) -> &'static str {
        match self {
            Stage::Sourcing => "sourcing",
            Stage::Screening => "screening",
            Stage::ClientReview => "client_review",
            Stage::Interview => "interview",
            Stage::Verification => "verification",
            Stage::Onboarding => "onboarding",
            Stage::Hired => "hired",
            Stage::Disqualified => "disqualified",
        }
    }

    /// Maps a backend stage identifier to a stage. Accepts the canonical id,
    /// display labels and variant names in any case, and known aliases.
    /// Anything else maps to `FALLBACK_STAGE`.
    pub fn from_backend(backend_id: &str) -> Stage {
        match squash(backend_id).as_str() {
            "sourcing" => Stage::Sourcing,
            "screening" => Stage::Screening,
            "clientreview" | "clientscreening" => Stage::ClientReview,
            "interview" | "interviewing" => Stage::Interview,
            "verification" => Stage::Verification,
            "onboarding" => Stage::Onboarding,
            "hired" => Stage::Hired,
            "disqualified" => Stage::Disqualified,
            _ => {
                warn!(
                    backend_id,
                    fallback = FALLBACK_STAGE.label(),
                    "Unrecognised backend stage identifier"
                );
                FALLBACK_STAGE
            }
        }
    }

    /// Position on the progress bar. `None` for `Disqualified`.
    pub fn progress_index(&self) -> Option<usize> {
        PIPELINE_ORDER.iter().position(|s| s == self)
    }

    /// Allowed statuses for this stage. Empty means "status not applicable".
    pub fn statuses(&self) -> &'static [Status] {
        match self {
            Stage::Sourcing => SOURCING_STATUSES,
            Stage::Screening => SCREENING_STATUSES,
            Stage::ClientReview => CLIENT_REVIEW_STATUSES,
            Stage::Interview => INTERVIEW_STATUSES,
            Stage::Verification => VERIFICATION_STATUSES,
            Stage::Onboarding => ONBOARDING_STATUSES,
            Stage::Hired => &[],
            Stage::Disqualified => DISQUALIFIED_STATUSES,
        }
    }

    pub fn has_status(&self, status: Status) -> bool {
        self.statuses().contains(&status)
    }

    /// Status a candidate takes on when moved into this stage.
    pub fn entry_status(&self) -> Option<Status> {
        self.statuses().first().copied()
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(backend_to_stage(&raw))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn stage_to_backend(stage: Stage) -> &'static str {
    stage.to_backend()
}

pub fn backend_to_stage(backend_id: &str) -> Stage {
    Stage::from_backend(backend_id)
}

pub fn status_options_for(stage: Stage) -> &'static [Status] {
    stage.statuses()
}

/// A status value within a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Pending,
    ConnectionsSent,
    ConnectionsAccepted,
    CVReceived,
    AEMSInterview,
    SubmissionPending,
    CVSubmitted,
    ClientShortlisted,
    OnHold,
    InterviewScheduled,
    InterviewCompleted,
    FeedbackPending,
    Selected,
    DocumentsPending,
    BackgroundCheck,
    ReferenceCheck,
    Verified,
    Completed,
    Disqualified,
}

const ALL_STATUSES: [Status; 19] = [
    Status::Pending,
    Status::ConnectionsSent,
    Status::ConnectionsAccepted,
    Status::CVReceived,
    Status::AEMSInterview,
    Status::SubmissionPending,
    Status::CVSubmitted,
    Status::ClientShortlisted,
    Status::OnHold,
    Status::InterviewScheduled,
    Status::InterviewCompleted,
    Status::FeedbackPending,
    Status::Selected,
    Status::DocumentsPending,
    Status::BackgroundCheck,
    Status::ReferenceCheck,
    Status::Verified,
    Status::Completed,
    Status::Disqualified,
];

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::ConnectionsSent => "Connections Sent",
            Status::ConnectionsAccepted => "Connections Accepted",
            Status::CVReceived => "CV Received",
            Status::AEMSInterview => "AEMS Interview",
            Status::SubmissionPending => "Submission Pending",
            Status::CVSubmitted => "CV Submitted",
            Status::ClientShortlisted => "Client Shortlisted",
            Status::OnHold => "On Hold",
            Status::InterviewScheduled => "Interview Scheduled",
            Status::InterviewCompleted => "Interview Completed",
            Status::FeedbackPending => "Feedback Pending",
            Status::Selected => "Selected",
            Status::DocumentsPending => "Documents Pending",
            Status::BackgroundCheck => "Background Check",
            Status::ReferenceCheck => "Reference Check",
            Status::Verified => "Verified",
            Status::Completed => "Completed",
            Status::Disqualified => "Disqualified",
        }
    }

    pub fn to_backend(&self) -> String {
        normalize_identifier(self.label())
    }

    /// Accepts backend ids, labels and variant names. There is no fallback
    /// status; an unknown id is `None`.
    pub fn from_backend(backend_id: &str) -> Option<Status> {
        let key = squash(backend_id);
        ALL_STATUSES
            .iter()
            .copied()
            .find(|s| squash(s.label()) == key)
    }

    /// The status that signals a temp candidate is ready to be converted.
    pub fn is_conversion_signal(&self) -> bool {
        matches!(self, Status::CVReceived)
    }

    /// Statuses that mean the candidate has qualified for the next step.
    pub fn implies_progression(&self) -> bool {
        matches!(
            self,
            Status::SubmissionPending
                | Status::CVSubmitted
                | Status::ClientShortlisted
                | Status::InterviewScheduled
                | Status::InterviewCompleted
                | Status::Selected
                | Status::Verified
                | Status::Completed
        )
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Status::from_backend(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown status '{raw}'")))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A stage paired with a status from its own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageStatus {
    stage: Stage,
    status: Status,
}

impl StageStatus {
    pub fn new(stage: Stage, status: Status) -> Result<Self, VocabularyError> {
        if stage.statuses().is_empty() {
            return Err(VocabularyError::StatusNotApplicable(stage));
        }
        if !stage.has_status(status) {
            return Err(VocabularyError::ForeignStatus { stage, status });
        }
        Ok(Self { stage, status })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

/// Lowercases and collapses spaces/hyphens to underscores.
fn normalize_identifier(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Identifier with case and separators removed: `Client Review`,
/// `client_review` and `ClientReview` all squash to `clientreview`.
fn squash(raw: &str) -> String {
    normalize_identifier(raw).replace('_', "")
}
