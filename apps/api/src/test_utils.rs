//! In-memory fakes for the pipeline's external collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::pipeline::models::{Candidate, CandidateId, PipelineId, TempCandidateFields};
use crate::pipeline::store::{
    Ack, CandidateConverter, PipelineStore, StageUpdate, StatusUpdate, StoreError,
};
use crate::pipeline::vocabulary::{Stage, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Stage(StageUpdate),
    Status(StatusUpdate),
}

/// Records every write. Optionally fails, or parks each call on `gate`
/// until notified.
#[derive(Default)]
pub struct FakeStore {
    pub calls: Mutex<Vec<Call>>,
    pub fail_with: Option<StoreError>,
    pub gate: Option<Arc<Notify>>,
}

impl FakeStore {
    pub fn failing(err: StoreError) -> Self {
        Self {
            fail_with: Some(err),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond(&self, call: Call) -> Result<Ack, StoreError> {
        self.calls.lock().unwrap().push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(Ack::default()),
        }
    }
}

#[async_trait]
impl PipelineStore for FakeStore {
    async fn update_candidate_stage(
        &self,
        _pipeline_id: &PipelineId,
        _candidate_id: &CandidateId,
        update: &StageUpdate,
    ) -> Result<Ack, StoreError> {
        self.respond(Call::Stage(update.clone())).await
    }

    async fn update_candidate_status(
        &self,
        _pipeline_id: &PipelineId,
        _candidate_id: &CandidateId,
        update: &StatusUpdate,
    ) -> Result<Ack, StoreError> {
        self.respond(Call::Status(update.clone())).await
    }
}

/// Returns `result` for every conversion and counts how often it ran.
pub struct FakeConverter {
    pub result: Result<CandidateId, StoreError>,
    pub invocations: Mutex<usize>,
}

impl FakeConverter {
    pub fn succeeding(id: &str) -> Self {
        Self {
            result: Ok(CandidateId::new(id)),
            invocations: Mutex::new(0),
        }
    }

    pub fn failing(err: StoreError) -> Self {
        Self {
            result: Err(err),
            invocations: Mutex::new(0),
        }
    }

    pub fn invocations(&self) -> usize {
        *self.invocations.lock().unwrap()
    }
}

#[async_trait]
impl CandidateConverter for FakeConverter {
    async fn convert(
        &self,
        _pipeline_id: &PipelineId,
        _temp_id: &CandidateId,
        _fields: &TempCandidateFields,
    ) -> Result<CandidateId, StoreError> {
        *self.invocations.lock().unwrap() += 1;
        self.result.clone()
    }
}

pub fn candidate(stage: Stage, status: Option<Status>) -> Candidate {
    Candidate {
        id: CandidateId::new("c-1"),
        name: "Ada Lovelace".into(),
        current_stage: stage,
        status,
        is_temp_candidate: false,
        disqualified: None,
    }
}
