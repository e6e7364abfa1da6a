use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::pipeline::vocabulary::{Stage, Status};

/// Identifier of a pipeline (one job opening) in the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(pub String);

/// Identifier of a candidate entry within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl PipelineId {
    pub fn new(s: impl Into<String>) -> Self {
        PipelineId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CandidateId {
    pub fn new(s: impl Into<String>) -> Self {
        CandidateId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage/status snapshot taken when a candidate was disqualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disqualification {
    pub disqualification_stage: Stage,
    pub disqualification_status: Option<Status>,
    pub disqualification_reason: String,
    pub disqualification_date: DateTime<Utc>,
}

/// A candidate's entry in one pipeline.
///
/// `status == Some(Disqualified)` if and only if `disqualified` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub current_stage: Stage,
    pub status: Option<Status>,
    #[serde(default)]
    pub is_temp_candidate: bool,
    #[serde(default)]
    pub disqualified: Option<Disqualification>,
}

impl Candidate {
    pub fn is_disqualified(&self) -> bool {
        self.status == Some(Status::Disqualified)
    }

    /// True when the disqualification record and status agree.
    pub fn disqualification_consistent(&self) -> bool {
        self.is_disqualified() == self.disqualified.is_some()
    }

    /// The stage whose vocabulary governs status changes. For a
    /// disqualified candidate this is the stage it was disqualified from.
    pub fn status_stage(&self) -> Stage {
        match (&self.disqualified, self.current_stage) {
            (Some(record), Stage::Disqualified) => record.disqualification_stage,
            _ => self.current_stage,
        }
    }
}

/// Interview details collected before a move into `Interview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewDetails {
    /// Local date-time as entered, e.g. `2024-03-01T10:00`.
    pub scheduled_at: String,
    pub meeting_link: String,
}

/// Disqualification details collected before a candidate is disqualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisqualificationDetails {
    pub reason: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Data supplied through a side channel to resume a suspended transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideChannelPayload {
    Interview(InterviewDetails),
    Disqualification(DisqualificationDetails),
}

/// What a transition is trying to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Proposal {
    Stage(Stage),
    Status(Status),
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proposal::Stage(stage) => write!(f, "stage {stage}"),
            Proposal::Status(status) => write!(f, "status {status}"),
        }
    }
}

/// An in-flight remote write. Lives from the start of a transition until it
/// is committed or rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub id: Uuid,
    pub pipeline_id: PipelineId,
    pub candidate_id: CandidateId,
    pub proposal: Proposal,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payload: Option<SideChannelPayload>,
}

impl PendingMutation {
    pub fn new(
        pipeline_id: PipelineId,
        candidate_id: CandidateId,
        proposal: Proposal,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            candidate_id,
            proposal,
            notes,
            payload: None,
        }
    }
}

/// Local cache entry for an optimistic stage update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChange {
    pub pipeline_id: PipelineId,
    pub candidate_id: CandidateId,
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
}

/// Fields captured for a temp candidate, handed to the conversion flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempCandidateFields {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
}
