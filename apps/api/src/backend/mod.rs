/// Backend client — the single HTTP gateway to the recruiting system of record.
///
/// Implements both contracts the pipeline coordinator consumes
/// (`PipelineStore` and `CandidateConverter`). No automatic retries: a failed
/// write is rolled back by the coordinator and retried by the user.
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::pipeline::models::{CandidateId, PipelineId, TempCandidateFields};
use crate::pipeline::store::{
    Ack, CandidateConverter, PipelineStore, StageUpdate, StatusUpdate, StoreError,
};

#[derive(Debug, Deserialize)]
struct BackendError {
    error: BackendErrorBody,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertRequest<'a> {
    pipeline_id: &'a PipelineId,
    temp_candidate_id: &'a CandidateId,
    #[serde(flatten)]
    fields: &'a TempCandidateFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConvertResponse {
    candidate_id: String,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BackendClient {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn candidate_url(&self, pipeline_id: &PipelineId, candidate_id: &CandidateId, leaf: &str) -> String {
        format!(
            "{}/pipelines/{}/candidates/{}/{}",
            self.base_url,
            pipeline_id.as_str(),
            candidate_id.as_str(),
            leaf
        )
    }

    async fn patch<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Ack, StoreError> {
        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;

        let response = check_status(response).await?;
        let text = response.text().await.map_err(map_transport)?;
        debug!(url, "Backend update acknowledged");
        parse_ack(&text)
    }
}

#[async_trait]
impl PipelineStore for BackendClient {
    async fn update_candidate_stage(
        &self,
        pipeline_id: &PipelineId,
        candidate_id: &CandidateId,
        update: &StageUpdate,
    ) -> Result<Ack, StoreError> {
        let url = self.candidate_url(pipeline_id, candidate_id, "stage");
        self.patch(&url, update).await
    }

    async fn update_candidate_status(
        &self,
        pipeline_id: &PipelineId,
        candidate_id: &CandidateId,
        update: &StatusUpdate,
    ) -> Result<Ack, StoreError> {
        let url = self.candidate_url(pipeline_id, candidate_id, "status");
        self.patch(&url, update).await
    }
}

#[async_trait]
impl CandidateConverter for BackendClient {
    async fn convert(
        &self,
        pipeline_id: &PipelineId,
        temp_id: &CandidateId,
        fields: &TempCandidateFields,
    ) -> Result<CandidateId, StoreError> {
        let url = format!("{}/candidates/convert", self.base_url);
        let body = ConvertRequest {
            pipeline_id,
            temp_candidate_id: temp_id,
            fields,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let response = check_status(response).await?;
        let parsed: ConvertResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        if parsed.candidate_id.trim().is_empty() {
            return Err(StoreError::Malformed("empty candidateId".to_string()));
        }
        Ok(CandidateId::new(parsed.candidate_id))
    }
}

fn map_transport(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Backend returned {}: {}", status, body);
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pulls `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<BackendError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Some endpoints answer 204 or an empty body; both count as an ack.
fn parse_ack(text: &str) -> Result<Ack, StoreError> {
    if text.trim().is_empty() {
        return Ok(Ack::default());
    }
    serde_json::from_str(text).map_err(|e| StoreError::Malformed(e.to_string()))
}
