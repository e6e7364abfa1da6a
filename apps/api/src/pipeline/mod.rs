// Candidate pipeline: stage/status vocabulary, transition validation, the
// optimistic stage cache, and the mutation coordinator that ties them to the
// remote system of record. Handlers expose the coordinator to the view layer.

pub mod cache;
pub mod coordinator;
pub mod handlers;
pub mod models;
pub mod store;
pub mod ui;
pub mod validator;
pub mod vocabulary;

// Re-export the public API consumed by other modules (state, errors, main).
pub use cache::StageCache;
pub use coordinator::{PipelineCoordinator, PipelineError};
