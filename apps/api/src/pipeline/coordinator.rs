//! Pipeline mutation coordinator.
//!
//! Each transition walks `Validating → (SideChannel)? → Applying →
//! Committed | RolledBack`. A transition that needs side-channel data is
//! returned to the caller as `TransitionOutcome::AwaitingSideChannel` carrying
//! its `PendingMutation`; the caller resumes it with `resume` once the data is
//! collected, or simply drops it to cancel. Nothing is written to the cache or
//! the remote store before `Applying`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pipeline::cache::StageCache;
use crate::pipeline::models::{
    Candidate, CandidateId, Disqualification, DisqualificationDetails, InterviewDetails,
    PendingMutation, PipelineId, Proposal, SideChannelPayload, TempCandidateFields,
};
use crate::pipeline::store::{
    CandidateConverter, DisqualificationUpdate, PipelineStore, StageUpdate, StatusUpdate,
    StoreError,
};
use crate::pipeline::ui::PipelineUi;
use crate::pipeline::validator::{is_no_op, validate, Decision, SideChannelKind};
use crate::pipeline::vocabulary::{Stage, StageStatus, Status, VocabularyError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] VocabularyError),

    #[error("remote update failed: {0}")]
    Remote(StoreError),

    #[error("candidate conversion failed: {0}")]
    Conversion(StoreError),

    #[error("a mutation for candidate {candidate_id} in pipeline {pipeline_id} is already in flight")]
    MutationInFlight {
        pipeline_id: PipelineId,
        candidate_id: CandidateId,
    },

    #[error("expected {expected:?} details for this transition")]
    PayloadMismatch { expected: SideChannelKind },

    #[error("side-channel data incomplete: {0}")]
    SideChannelIncomplete(&'static str),

    #[error("mutation {0} no longer matches the candidate")]
    StaleMutation(Uuid),

    /// The temp candidate was converted but the replayed change did not
    /// land. Carries the permanent record so the caller retries against it.
    #[error("candidate converted to {} but the replayed change failed: {source}", .converted.id)]
    ReplayFailed {
        converted: Box<Candidate>,
        source: Box<PipelineError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Validating,
    SideChannel,
    Applying,
    Committed,
    RolledBack,
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionState::Validating => "validating",
            TransitionState::SideChannel => "side_channel",
            TransitionState::Applying => "applying",
            TransitionState::Committed => "committed",
            TransitionState::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    NoOp,
    Committed { candidate: Candidate },
    BlockedTemp { message: String },
    RequiresConversion,
    AwaitingSideChannel {
        kind: SideChannelKind,
        pending: PendingMutation,
    },
}

/// The remote call a transition resolves to.
#[derive(Debug, Clone, PartialEq)]
enum RemoteWrite {
    Stage(StageUpdate),
    Status(StatusUpdate),
}

type MutationKey = (PipelineId, CandidateId);

/// Marks a key as Applying; released on drop.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<MutationKey>>>,
    key: MutationKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
    }
}

/// Drives stage/status transitions against the remote store with an
/// optimistic local overlay.
#[derive(Clone)]
pub struct PipelineCoordinator {
    store: Arc<dyn PipelineStore>,
    converter: Arc<dyn CandidateConverter>,
    cache: StageCache,
    in_flight: Arc<Mutex<HashSet<MutationKey>>>,
    /// Temp id → permanent id for conversions whose replay has not landed.
    converted: Arc<Mutex<HashMap<MutationKey, CandidateId>>>,
}

impl PipelineCoordinator {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        converter: Arc<dyn CandidateConverter>,
        cache: StageCache,
    ) -> Self {
        Self {
            store,
            converter,
            cache,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            converted: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &StageCache {
        &self.cache
    }

    pub async fn on_stage_change_requested(
        &self,
        pipeline_id: &PipelineId,
        candidate: &Candidate,
        stage: Stage,
        notes: Option<String>,
        ui: &dyn PipelineUi,
    ) -> Result<TransitionOutcome, PipelineError> {
        self.request(pipeline_id, candidate, Proposal::Stage(stage), notes, ui)
            .await
    }

    pub async fn on_status_change_requested(
        &self,
        pipeline_id: &PipelineId,
        candidate: &Candidate,
        status: Status,
        notes: Option<String>,
        ui: &dyn PipelineUi,
    ) -> Result<TransitionOutcome, PipelineError> {
        self.request(pipeline_id, candidate, Proposal::Status(status), notes, ui)
            .await
    }

    async fn request(
        &self,
        pipeline_id: &PipelineId,
        candidate: &Candidate,
        proposal: Proposal,
        notes: Option<String>,
        ui: &dyn PipelineUi,
    ) -> Result<TransitionOutcome, PipelineError> {
        debug!(
            %pipeline_id,
            candidate_id = %candidate.id,
            %proposal,
            state = %TransitionState::Validating,
            "Transition requested"
        );

        match validate(candidate, proposal)? {
            Decision::Allowed => {
                if is_no_op(candidate, proposal) {
                    debug!(candidate_id = %candidate.id, %proposal, "No-op transition");
                    return Ok(TransitionOutcome::NoOp);
                }
                let pending =
                    PendingMutation::new(pipeline_id.clone(), candidate.id.clone(), proposal, notes);
                let committed = self.apply(candidate, pending, ui).await?;
                Ok(TransitionOutcome::Committed {
                    candidate: committed,
                })
            }
            Decision::BlockedTemp(message) => {
                info!(candidate_id = %candidate.id, %proposal, "Blocked: temp candidate");
                ui.open_temp_candidate_alert(candidate, &message);
                Ok(TransitionOutcome::BlockedTemp { message })
            }
            Decision::RequiresConversion => {
                info!(candidate_id = %candidate.id, %proposal, "Conversion required");
                ui.open_conversion_flow(candidate);
                Ok(TransitionOutcome::RequiresConversion)
            }
            Decision::RequiresSideChannel(kind) => {
                let pending =
                    PendingMutation::new(pipeline_id.clone(), candidate.id.clone(), proposal, notes);
                info!(
                    mutation_id = %pending.id,
                    candidate_id = %candidate.id,
                    %proposal,
                    ?kind,
                    state = %TransitionState::SideChannel,
                    "Awaiting side-channel data"
                );
                match kind {
                    SideChannelKind::Interview => ui.open_interview_dialog(candidate),
                    SideChannelKind::Disqualification => ui.open_disqualification_dialog(candidate),
                }
                Ok(TransitionOutcome::AwaitingSideChannel { kind, pending })
            }
        }
    }

    /// Resumes a transition suspended in SideChannel with the collected data.
    pub async fn resume(
        &self,
        candidate: &Candidate,
        mut pending: PendingMutation,
        payload: SideChannelPayload,
        ui: &dyn PipelineUi,
    ) -> Result<Candidate, PipelineError> {
        if pending.candidate_id != candidate.id {
            return Err(PipelineError::StaleMutation(pending.id));
        }

        match validate(candidate, pending.proposal)? {
            Decision::RequiresSideChannel(kind) if kind == payload_kind(&payload) => {}
            Decision::RequiresSideChannel(kind) => {
                return Err(PipelineError::PayloadMismatch { expected: kind })
            }
            _ => return Err(PipelineError::StaleMutation(pending.id)),
        }

        pending.payload = Some(payload);
        self.apply(candidate, pending, ui).await
    }

    /// Runs the external conversion flow for a temp candidate, then replays
    /// the status change against the permanent record.
    ///
    /// A temp candidate is converted at most once: if the replay fails, a
    /// retry with either the temp or the permanent record reuses the
    /// permanent id instead of creating another profile.
    pub async fn convert_and_replay(
        &self,
        pipeline_id: &PipelineId,
        candidate: &Candidate,
        status: Status,
        fields: &TempCandidateFields,
        notes: Option<String>,
        ui: &dyn PipelineUi,
    ) -> Result<TransitionOutcome, PipelineError> {
        if validate(candidate, Proposal::Status(status))? != Decision::RequiresConversion {
            return self
                .on_status_change_requested(pipeline_id, candidate, status, notes, ui)
                .await;
        }

        let key = (pipeline_id.clone(), candidate.id.clone());
        let permanent_id = match self.earlier_conversion(&key) {
            Some(id) => {
                info!(temp_id = %candidate.id, %id, "Reusing earlier conversion");
                id
            }
            None => {
                let id = match self.converter.convert(pipeline_id, &candidate.id, fields).await {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(candidate_id = %candidate.id, error = %e, "Candidate conversion failed");
                        ui.notify_failure(&format!("Could not create candidate {}: {e}", fields.name));
                        return Err(PipelineError::Conversion(e));
                    }
                };
                self.lock_converted().insert(key.clone(), id.clone());
                id
            }
        };
        info!(
            temp_id = %candidate.id,
            %permanent_id,
            "Temp candidate converted; replaying status change"
        );
        // The temp id no longer exists in the system of record.
        self.cache.remove(pipeline_id, &candidate.id).await;

        let converted = Candidate {
            id: permanent_id,
            name: fields.name.clone(),
            is_temp_candidate: false,
            ..candidate.clone()
        };
        match self
            .on_status_change_requested(pipeline_id, &converted, status, notes, ui)
            .await
        {
            Ok(outcome) => {
                self.lock_converted().remove(&key);
                Ok(outcome)
            }
            Err(e) => Err(PipelineError::ReplayFailed {
                converted: Box::new(converted),
                source: Box::new(e),
            }),
        }
    }

    fn earlier_conversion(&self, key: &MutationKey) -> Option<CandidateId> {
        self.lock_converted().get(key).cloned()
    }

    fn lock_converted(&self) -> MutexGuard<'_, HashMap<MutationKey, CandidateId>> {
        self.converted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn apply(
        &self,
        candidate: &Candidate,
        pending: PendingMutation,
        ui: &dyn PipelineUi,
    ) -> Result<Candidate, PipelineError> {
        let (write, next) = plan(candidate, &pending)?;
        let pipeline_id = &pending.pipeline_id;
        let _guard = self.begin(pipeline_id, &candidate.id)?;

        let previous = self
            .cache
            .get(pipeline_id, &candidate.id)
            .await
            .unwrap_or(candidate.current_stage);
        self.cache
            .put(pipeline_id, &candidate.id, next.current_stage)
            .await;

        info!(
            mutation_id = %pending.id,
            %pipeline_id,
            candidate_id = %candidate.id,
            from = %previous,
            to = %next.current_stage,
            state = %TransitionState::Applying,
            "Applying transition"
        );

        let result = match &write {
            RemoteWrite::Stage(update) => {
                self.store
                    .update_candidate_stage(pipeline_id, &candidate.id, update)
                    .await
            }
            RemoteWrite::Status(update) => {
                self.store
                    .update_candidate_status(pipeline_id, &candidate.id, update)
                    .await
            }
        };

        match result {
            Ok(_) => {
                debug_assert!(
                    next.disqualification_consistent(),
                    "committed candidate {} has a mismatched disqualification record",
                    next.id
                );
                info!(
                    mutation_id = %pending.id,
                    state = %TransitionState::Committed,
                    "Transition committed"
                );
                Ok(next)
            }
            Err(e) => {
                self.cache.put(pipeline_id, &candidate.id, previous).await;
                warn!(
                    mutation_id = %pending.id,
                    candidate_id = %candidate.id,
                    error = %e,
                    restored = %previous,
                    state = %TransitionState::RolledBack,
                    "Remote update failed; rolled back"
                );
                ui.notify_failure(&format!("Could not update {}: {e}", candidate.name));
                Err(PipelineError::Remote(e))
            }
        }
    }

    fn begin(
        &self,
        pipeline_id: &PipelineId,
        candidate_id: &CandidateId,
    ) -> Result<InFlightGuard, PipelineError> {
        let key = (pipeline_id.clone(), candidate_id.clone());
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.clone());
        if !inserted {
            return Err(PipelineError::MutationInFlight {
                pipeline_id: pipeline_id.clone(),
                candidate_id: candidate_id.clone(),
            });
        }
        Ok(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        })
    }
}

fn payload_kind(payload: &SideChannelPayload) -> SideChannelKind {
    match payload {
        SideChannelPayload::Interview(_) => SideChannelKind::Interview,
        SideChannelPayload::Disqualification(_) => SideChannelKind::Disqualification,
    }
}

/// Resolves a pending mutation into the remote write and the candidate
/// record that results once it is committed.
fn plan(
    candidate: &Candidate,
    pending: &PendingMutation,
) -> Result<(RemoteWrite, Candidate), PipelineError> {
    let notes = pending.notes.clone();
    let disqualifying = matches!(
        pending.proposal,
        Proposal::Stage(Stage::Disqualified) | Proposal::Status(Status::Disqualified)
    );

    if disqualifying {
        let details = match &pending.payload {
            Some(SideChannelPayload::Disqualification(details)) => details,
            _ => return Err(PipelineError::SideChannelIncomplete("disqualification reason")),
        };
        return plan_disqualification(candidate, details, notes);
    }

    match pending.proposal {
        Proposal::Stage(stage) => {
            let interview = match &pending.payload {
                Some(SideChannelPayload::Interview(details)) => {
                    Some(checked_interview(details)?.clone())
                }
                _ => None,
            };
            let update = StageUpdate {
                stage: stage.to_backend().to_string(),
                notes,
                interview,
            };
            let next = Candidate {
                current_stage: stage,
                status: stage.entry_status(),
                disqualified: None,
                ..candidate.clone()
            };
            Ok((RemoteWrite::Stage(update), next))
        }
        Proposal::Status(status) => {
            let target = StageStatus::new(candidate.status_stage(), status)?;
            let update = StatusUpdate {
                status: target.status().to_backend(),
                stage: target.stage().to_backend().to_string(),
                notes,
                disqualification: None,
            };
            let next = Candidate {
                current_stage: target.stage(),
                status: Some(target.status()),
                disqualified: None,
                ..candidate.clone()
            };
            Ok((RemoteWrite::Status(update), next))
        }
    }
}

fn plan_disqualification(
    candidate: &Candidate,
    details: &DisqualificationDetails,
    notes: Option<String>,
) -> Result<(RemoteWrite, Candidate), PipelineError> {
    let reason = details.reason.trim();
    if reason.is_empty() {
        return Err(PipelineError::SideChannelIncomplete("disqualification reason"));
    }

    let from_stage = candidate.current_stage;
    let from_status = candidate.status;
    // A temp candidate's stage does not move until it is converted.
    let to_stage = if candidate.is_temp_candidate {
        from_stage
    } else {
        Stage::Disqualified
    };
    let update = StatusUpdate {
        status: Status::Disqualified.to_backend(),
        stage: to_stage.to_backend().to_string(),
        notes,
        disqualification: Some(DisqualificationUpdate {
            stage: from_stage.to_backend().to_string(),
            status: from_status.map(|s| s.to_backend()),
            reason: reason.to_string(),
            feedback: details.feedback.clone(),
        }),
    };
    let next = Candidate {
        current_stage: to_stage,
        status: Some(Status::Disqualified),
        disqualified: Some(Disqualification {
            disqualification_stage: from_stage,
            disqualification_status: from_status,
            disqualification_reason: reason.to_string(),
            disqualification_date: Utc::now(),
        }),
        ..candidate.clone()
    };
    Ok((RemoteWrite::Status(update), next))
}

fn checked_interview(details: &InterviewDetails) -> Result<&InterviewDetails, PipelineError> {
    if details.scheduled_at.trim().is_empty() {
        return Err(PipelineError::SideChannelIncomplete("interview date and time"));
    }
    if details.meeting_link.trim().is_empty() {
        return Err(PipelineError::SideChannelIncomplete("meeting link"));
    }
    Ok(details)
}
