//! Axum route handlers for the candidate pipeline.
//!
//! The view layer sends the candidate record it is displaying along with the
//! proposed change; each response carries the outcome plus the dialogs or
//! alerts the view should open.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::pipeline::coordinator::TransitionOutcome;
use crate::pipeline::models::{
    Candidate, CandidateId, PendingMutation, PipelineId, SideChannelPayload, TempCandidateFields,
};
use crate::pipeline::ui::{RecordingUi, UiEffect};
use crate::pipeline::vocabulary::{stage_to_backend, status_options_for, Stage, Status, ALL_STAGES};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangeRequest {
    pub candidate: Candidate,
    pub stage: Stage,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub candidate: Candidate,
    pub status: Status,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub candidate: Candidate,
    pub pending: PendingMutation,
    pub payload: SideChannelPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub candidate: Candidate,
    pub status: Status,
    pub fields: TempCandidateFields,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    #[serde(flatten)]
    pub outcome: TransitionOutcome,
    pub ui_effects: Vec<UiEffect>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedStageResponse {
    pub pipeline_id: PipelineId,
    pub candidate_id: CandidateId,
    pub stage: Option<Stage>,
    pub progress_index: Option<usize>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOption {
    pub status: Status,
    pub label: &'static str,
    pub backend_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageVocabulary {
    pub stage: Stage,
    pub label: &'static str,
    pub backend_id: &'static str,
    pub progress_index: Option<usize>,
    /// Empty means status is not applicable for this stage.
    pub statuses: Vec<StatusOption>,
}

fn ensure_same_candidate(path_id: &str, candidate: &Candidate) -> Result<(), AppError> {
    if candidate.id.as_str() != path_id {
        return Err(AppError::Validation(format!(
            "candidate id {} does not match path id {path_id}",
            candidate.id
        )));
    }
    Ok(())
}

fn respond(outcome: TransitionOutcome, ui: RecordingUi) -> Json<TransitionResponse> {
    Json(TransitionResponse {
        outcome,
        ui_effects: ui.into_effects(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/pipelines/:pipeline_id/candidates/:candidate_id/stage
pub async fn handle_stage_change(
    State(state): State<AppState>,
    Path((pipeline_id, candidate_id)): Path<(String, String)>,
    Json(req): Json<StageChangeRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    ensure_same_candidate(&candidate_id, &req.candidate)?;
    let pipeline_id = PipelineId::new(pipeline_id);
    let ui = RecordingUi::new();

    let outcome = state
        .coordinator
        .on_stage_change_requested(&pipeline_id, &req.candidate, req.stage, req.notes, &ui)
        .await?;
    Ok(respond(outcome, ui))
}

/// POST /api/v1/pipelines/:pipeline_id/candidates/:candidate_id/status
pub async fn handle_status_change(
    State(state): State<AppState>,
    Path((pipeline_id, candidate_id)): Path<(String, String)>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    ensure_same_candidate(&candidate_id, &req.candidate)?;
    let pipeline_id = PipelineId::new(pipeline_id);
    let ui = RecordingUi::new();

    let outcome = state
        .coordinator
        .on_status_change_requested(&pipeline_id, &req.candidate, req.status, req.notes, &ui)
        .await?;
    Ok(respond(outcome, ui))
}

/// POST /api/v1/pipelines/:pipeline_id/candidates/:candidate_id/resume
///
/// Completes a transition that was suspended awaiting interview or
/// disqualification details.
pub async fn handle_resume(
    State(state): State<AppState>,
    Path((pipeline_id, candidate_id)): Path<(String, String)>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    ensure_same_candidate(&candidate_id, &req.candidate)?;
    if req.pending.pipeline_id.as_str() != pipeline_id {
        return Err(AppError::Validation(format!(
            "pending mutation belongs to pipeline {}",
            req.pending.pipeline_id
        )));
    }
    let ui = RecordingUi::new();

    let candidate = state
        .coordinator
        .resume(&req.candidate, req.pending, req.payload, &ui)
        .await?;
    Ok(respond(TransitionOutcome::Committed { candidate }, ui))
}

/// POST /api/v1/pipelines/:pipeline_id/candidates/:candidate_id/convert
pub async fn handle_convert(
    State(state): State<AppState>,
    Path((pipeline_id, candidate_id)): Path<(String, String)>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    ensure_same_candidate(&candidate_id, &req.candidate)?;
    if req.fields.name.trim().is_empty() {
        return Err(AppError::Validation("fields.name cannot be empty".to_string()));
    }
    let pipeline_id = PipelineId::new(pipeline_id);
    let ui = RecordingUi::new();

    let outcome = state
        .coordinator
        .convert_and_replay(
            &pipeline_id,
            &req.candidate,
            req.status,
            &req.fields,
            req.notes,
            &ui,
        )
        .await?;
    Ok(respond(outcome, ui))
}

/// GET /api/v1/pipelines/:pipeline_id/candidates/:candidate_id/stage
///
/// Returns the optimistic override, if any. `stage: null` means the caller
/// should use the candidate's authoritative stage.
pub async fn handle_get_cached_stage(
    State(state): State<AppState>,
    Path((pipeline_id, candidate_id)): Path<(String, String)>,
) -> Json<CachedStageResponse> {
    let pipeline_id = PipelineId::new(pipeline_id);
    let candidate_id = CandidateId::new(candidate_id);
    let entry = state
        .coordinator
        .cache()
        .entry(&pipeline_id, &candidate_id)
        .await;

    Json(CachedStageResponse {
        pipeline_id,
        candidate_id,
        stage: entry.as_ref().map(|e| e.stage),
        progress_index: entry.as_ref().and_then(|e| e.stage.progress_index()),
        updated_at: entry.map(|e| e.timestamp),
    })
}

/// DELETE /api/v1/stage-cache
pub async fn handle_clear_stage_cache(State(state): State<AppState>) -> StatusCode {
    state.coordinator.cache().clear().await;
    StatusCode::NO_CONTENT
}

/// GET /api/v1/vocabulary
pub async fn handle_vocabulary() -> Json<Vec<StageVocabulary>> {
    let stages = ALL_STAGES
        .iter()
        .map(|stage| StageVocabulary {
            stage: *stage,
            label: stage.label(),
            backend_id: stage_to_backend(*stage),
            progress_index: stage.progress_index(),
            statuses: status_options_for(*stage)
                .iter()
                .map(|status| StatusOption {
                    status: *status,
                    label: status.label(),
                    backend_id: status.to_backend(),
                })
                .collect(),
        })
        .collect();
    Json(stages)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::pipeline::models::{CandidateId, PipelineId};
    use crate::pipeline::store::StoreError;
    use crate::pipeline::vocabulary::Stage;
    use crate::pipeline::{PipelineCoordinator, StageCache};
    use crate::routes::build_router;
    use crate::state::AppState;
    use crate::test_utils::{FakeConverter, FakeStore};

    fn app(store: Arc<FakeStore>) -> (Router, StageCache) {
        let cache = StageCache::new();
        let coordinator = PipelineCoordinator::new(
            store,
            Arc::new(FakeConverter::succeeding("perm-7")),
            cache.clone(),
        );
        let state = AppState { coordinator };
        (build_router(state), cache)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn screening_candidate() -> Value {
        json!({
            "id": "c-1",
            "name": "Ada Lovelace",
            "currentStage": "Screening",
            "status": "CVSubmitted",
            "isTempCandidate": false
        })
    }

    #[tokio::test]
    async fn test_interview_flow_over_http() {
        let store = Arc::new(FakeStore::default());
        let (router, cache) = app(store.clone());

        let (status, body) = send(
            router.clone(),
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/stage",
            Some(json!({ "candidate": screening_candidate(), "stage": "Interview" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "awaiting_side_channel");
        assert_eq!(body["kind"], "interview");
        assert_eq!(body["uiEffects"][0]["effect"], "open_interview_dialog");

        let (status, body) = send(
            router,
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/resume",
            Some(json!({
                "candidate": screening_candidate(),
                "pending": body["pending"].clone(),
                "payload": {
                    "kind": "interview",
                    "scheduledAt": "2024-03-01T10:00",
                    "meetingLink": "https://meet.example/x"
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "committed");
        assert_eq!(body["candidate"]["currentStage"], "Interview");
        assert_eq!(store.calls().len(), 1);

        let stage = cache
            .get(&PipelineId::new("p-1"), &CandidateId::new("c-1"))
            .await;
        assert_eq!(stage, Some(Stage::Interview));
    }

    #[tokio::test]
    async fn test_remote_failure_maps_to_bad_gateway_and_rolls_back() {
        let store = Arc::new(FakeStore::failing(StoreError::Timeout));
        let (router, _) = app(store);

        let (status, body) = send(
            router.clone(),
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/stage",
            Some(json!({ "candidate": screening_candidate(), "stage": "ClientReview" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "REMOTE_FAILURE");

        let (_, cached) = send(
            router,
            Method::GET,
            "/api/v1/pipelines/p-1/candidates/c-1/stage",
            None,
        )
        .await;
        assert_eq!(cached["stage"], "Screening");
        assert_eq!(cached["progressIndex"], 1);
    }

    #[tokio::test]
    async fn test_foreign_status_is_bad_request() {
        let (router, _) = app(Arc::new(FakeStore::default()));
        let (status, body) = send(
            router,
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/status",
            Some(json!({ "candidate": screening_candidate(), "status": "Completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVARIANT_VIOLATION");
    }

    #[tokio::test]
    async fn test_path_and_body_candidate_must_match() {
        let (router, _) = app(Arc::new(FakeStore::default()));
        let (status, body) = send(
            router,
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-9/stage",
            Some(json!({ "candidate": screening_candidate(), "stage": "Hired" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_convert_replays_status_change() {
        let store = Arc::new(FakeStore::default());
        let (router, _) = app(store.clone());
        let temp = json!({
            "id": "c-1",
            "name": "Ada",
            "currentStage": "Sourcing",
            "status": "Pending",
            "isTempCandidate": true
        });

        let (_, body) = send(
            router.clone(),
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/status",
            Some(json!({ "candidate": temp.clone(), "status": "CVReceived" })),
        )
        .await;
        assert_eq!(body["outcome"], "requires_conversion");
        assert!(store.calls().is_empty());

        let (status, body) = send(
            router,
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/convert",
            Some(json!({
                "candidate": temp,
                "status": "CVReceived",
                "fields": { "name": "Ada Lovelace", "email": "ada@example.com" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "committed");
        assert_eq!(body["candidate"]["id"], "perm-7");
        assert_eq!(body["candidate"]["status"], "CVReceived");
        assert_eq!(body["candidate"]["isTempCandidate"], false);
    }

    #[tokio::test]
    async fn test_backend_stage_ids_are_normalized_on_input() {
        let store = Arc::new(FakeStore::default());
        let (router, _) = app(store.clone());

        let (status, body) = send(
            router.clone(),
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/status",
            Some(json!({
                "candidate": {
                    "id": "c-1",
                    "name": "Ada Lovelace",
                    "currentStage": "Client Screening",
                    "status": "pending"
                },
                "status": "client_shortlisted"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["candidate"]["currentStage"], "ClientReview");
        assert_eq!(body["candidate"]["status"], "ClientShortlisted");

        let (status, body) = send(
            router,
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/status",
            Some(json!({
                "candidate": {
                    "id": "c-1",
                    "name": "Ada Lovelace",
                    "currentStage": "talent_pool",
                    "status": "Pending"
                },
                "status": "Connections Sent"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["candidate"]["currentStage"], "Sourcing");
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_replay_returns_converted_candidate() {
        let store = Arc::new(FakeStore::failing(StoreError::Timeout));
        let (router, _) = app(store);

        let (status, body) = send(
            router,
            Method::POST,
            "/api/v1/pipelines/p-1/candidates/c-1/convert",
            Some(json!({
                "candidate": {
                    "id": "c-1",
                    "name": "Ada",
                    "currentStage": "Sourcing",
                    "status": "Pending",
                    "isTempCandidate": true
                },
                "status": "CVReceived",
                "fields": { "name": "Ada Lovelace" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "REPLAY_FAILED");
        assert_eq!(body["error"]["convertedCandidate"]["id"], "perm-7");
        assert_eq!(body["error"]["convertedCandidate"]["isTempCandidate"], false);
    }

    #[tokio::test]
    async fn test_clear_stage_cache() {
        let store = Arc::new(FakeStore::default());
        let (router, cache) = app(store);
        cache
            .put(
                &PipelineId::new("p-1"),
                &CandidateId::new("c-1"),
                Stage::Hired,
            )
            .await;

        let (status, _) = send(router, Method::DELETE, "/api/v1/stage-cache", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_vocabulary_lists_every_stage() {
        let (router, _) = app(Arc::new(FakeStore::default()));
        let (status, body) = send(router, Method::GET, "/api/v1/vocabulary", None).await;
        assert_eq!(status, StatusCode::OK);
        let stages = body.as_array().unwrap();
        assert_eq!(stages.len(), 8);
        assert_eq!(stages[2]["label"], "Client Review");
        assert_eq!(stages[2]["backendId"], "client_review");
        assert_eq!(stages[6]["statuses"], json!([]));
        assert_eq!(stages[7]["progressIndex"], Value::Null);
    }
}
