//! Transition validator — pure decision logic for proposed stage and status
//! changes. No I/O, no clock, no cache access.
//!
//! Evaluation order:
//! 1. No-op (target equals the current value) → `Allowed`
//! 2. Status (or a disqualifying stage move) outside the governing stage's
//!    vocabulary → `VocabularyError`
//! 3. Temp-candidate gate → `BlockedTemp` / `RequiresConversion`
//! 4. Re-qualification of a disqualified candidate → `Allowed`
//! 5. Side-channel requirements → `RequiresSideChannel`

use serde::Serialize;

use crate::pipeline::models::{Candidate, Proposal};
use crate::pipeline::vocabulary::{Stage, StageStatus, Status, VocabularyError};

pub const TEMP_STAGE_MESSAGE: &str =
    "This is a temporary candidate. Create the candidate profile before moving them to another stage.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideChannelKind {
    Interview,
    Disqualification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    BlockedTemp(String),
    RequiresConversion,
    RequiresSideChannel(SideChannelKind),
}

/// True when applying `proposal` would leave the candidate unchanged.
pub fn is_no_op(candidate: &Candidate, proposal: Proposal) -> bool {
    match proposal {
        Proposal::Stage(Stage::Disqualified) => {
            candidate.current_stage == Stage::Disqualified || candidate.is_disqualified()
        }
        Proposal::Stage(stage) => stage == candidate.current_stage,
        Proposal::Status(status) => candidate.status == Some(status),
    }
}

pub fn validate(candidate: &Candidate, proposal: Proposal) -> Result<Decision, VocabularyError> {
    match proposal {
        Proposal::Stage(stage) => validate_stage(candidate, stage),
        Proposal::Status(status) => validate_status(candidate, status),
    }
}

/// A move into `Disqualified` is a disqualification, so it is held to the
/// same vocabulary check as setting the `Disqualified` status.
pub fn validate_stage(candidate: &Candidate, target: Stage) -> Result<Decision, VocabularyError> {
    if is_no_op(candidate, Proposal::Stage(target)) {
        return Ok(Decision::Allowed);
    }
    if candidate.is_temp_candidate {
        return Ok(Decision::BlockedTemp(TEMP_STAGE_MESSAGE.to_string()));
    }
    if candidate.is_disqualified() {
        return Ok(Decision::Allowed);
    }

    match target {
        Stage::Interview => Ok(Decision::RequiresSideChannel(SideChannelKind::Interview)),
        Stage::Disqualified => {
            StageStatus::new(candidate.status_stage(), Status::Disqualified)?;
            Ok(Decision::RequiresSideChannel(SideChannelKind::Disqualification))
        }
        _ => Ok(Decision::Allowed),
    }
}

/// Status changes are checked against `Candidate::status_stage`, so a
/// disqualified candidate may be re-qualified with a status from the stage
/// it was disqualified from.
pub fn validate_status(candidate: &Candidate, target: Status) -> Result<Decision, VocabularyError> {
    if is_no_op(candidate, Proposal::Status(target)) {
        return Ok(Decision::Allowed);
    }
    StageStatus::new(candidate.status_stage(), target)?;

    if candidate.is_temp_candidate {
        if target.is_conversion_signal() {
            return Ok(Decision::RequiresConversion);
        }
        if target.implies_progression() {
            return Ok(Decision::BlockedTemp(format!(
                "This is a temporary candidate. Create the candidate profile before marking them as {target}."
            )));
        }
    }
    if candidate.is_disqualified() {
        return Ok(Decision::Allowed);
    }

    if target == Status::Disqualified {
        return Ok(Decision::RequiresSideChannel(SideChannelKind::Disqualification));
    }
    Ok(Decision::Allowed)
}
