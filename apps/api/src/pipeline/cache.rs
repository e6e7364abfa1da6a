use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::pipeline::models::{CandidateId, PipelineId, StageChange};
use crate::pipeline::vocabulary::Stage;

type CacheKey = (PipelineId, CandidateId);

/// Last-write-wins overlay of optimistic stage values, keyed by
/// (pipeline, candidate).
///
/// Cheap to clone; clones share the same map. No expiry and no history: a
/// `put` replaces whatever was there.
#[derive(Clone, Default)]
pub struct StageCache {
    entries: Arc<RwLock<HashMap<CacheKey, StageChange>>>,
}

impl StageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, pipeline_id: &PipelineId, candidate_id: &CandidateId, stage: Stage) {
        let change = StageChange {
            pipeline_id: pipeline_id.clone(),
            candidate_id: candidate_id.clone(),
            stage,
            timestamp: Utc::now(),
        };
        debug!(%pipeline_id, %candidate_id, stage = %stage, "Stage cache put");
        self.entries
            .write()
            .await
            .insert((pipeline_id.clone(), candidate_id.clone()), change);
    }

    pub async fn get(&self, pipeline_id: &PipelineId, candidate_id: &CandidateId) -> Option<Stage> {
        self.entry(pipeline_id, candidate_id).await.map(|c| c.stage)
    }

    /// Full entry including when it was written.
    pub async fn entry(
        &self,
        pipeline_id: &PipelineId,
        candidate_id: &CandidateId,
    ) -> Option<StageChange> {
        self.entries
            .read()
            .await
            .get(&(pipeline_id.clone(), candidate_id.clone()))
            .cloned()
    }

    /// Drops the override for one key so readers fall back to the
    /// candidate's authoritative stage.
    pub async fn remove(&self, pipeline_id: &PipelineId, candidate_id: &CandidateId) {
        self.entries
            .write()
            .await
            .remove(&(pipeline_id.clone(), candidate_id.clone()));
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        debug!(dropped = entries.len(), "Stage cache cleared");
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
