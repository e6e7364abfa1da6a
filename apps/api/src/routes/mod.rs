pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

const CANDIDATE_ROUTE: &str = "/api/v1/pipelines/:pipeline_id/candidates/:candidate_id";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/vocabulary", get(handlers::handle_vocabulary))
        .route(
            &format!("{CANDIDATE_ROUTE}/stage"),
            get(handlers::handle_get_cached_stage).post(handlers::handle_stage_change),
        )
        .route(
            &format!("{CANDIDATE_ROUTE}/status"),
            post(handlers::handle_status_change),
        )
        .route(
            &format!("{CANDIDATE_ROUTE}/resume"),
            post(handlers::handle_resume),
        )
        .route(
            &format!("{CANDIDATE_ROUTE}/convert"),
            post(handlers::handle_convert),
        )
        // Logout drops every optimistic override
        .route("/api/v1/stage-cache", delete(handlers::handle_clear_stage_cache))
        .with_state(state)
}
