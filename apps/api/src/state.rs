use crate::pipeline::PipelineCoordinator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Also owns the stage cache handle; handlers reach it through `coordinator.cache()`.
    pub coordinator: PipelineCoordinator,
}
