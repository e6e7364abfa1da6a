//! Contracts the coordinator consumes: the remote system of record and the
//! temp-candidate conversion flow.
//!
//! `BackendClient` implements both over HTTP; tests use in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::models::{
    CandidateId, InterviewDetails, PipelineId, TempCandidateFields,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Acknowledgement returned by the system of record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview: Option<InterviewDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisqualificationUpdate {
    pub stage: String,
    pub status: Option<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: String,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disqualification: Option<DisqualificationUpdate>,
}

/// The remote system of record. Both operations are idempotent from the
/// coordinator's point of view.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn update_candidate_stage(
        &self,
        pipeline_id: &PipelineId,
        candidate_id: &CandidateId,
        update: &StageUpdate,
    ) -> Result<Ack, StoreError>;

    async fn update_candidate_status(
        &self,
        pipeline_id: &PipelineId,
        candidate_id: &CandidateId,
        update: &StatusUpdate,
    ) -> Result<Ack, StoreError>;
}

/// Promotes a temp candidate to a permanent profile.
#[async_trait]
pub trait CandidateConverter: Send + Sync {
    async fn convert(
        &self,
        pipeline_id: &PipelineId,
        temp_id: &CandidateId,
        fields: &TempCandidateFields,
    ) -> Result<CandidateId, StoreError>;
}
