use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tc_core::{Memory, MemoryItem, MemoryKind, Thought};

use crate::error::ServiceError;
use crate::service::{Articulation, GenerationRequest, ThoughtService, validate_candidate};

#[derive(Serialize)]
struct ArticulateBody<'a> {
    thoughts: &'a [Thought],
    memory: &'a Memory,
}

#[derive(Serialize)]
struct MemoryBody<'a> {
    #[serde(rename = "type")]
    kind: MemoryKind,
    text: &'a str,
}

/// JSON client for a thought generation backend.
pub struct HttpThoughtService {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpThoughtService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ServiceError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http_client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Invalid(format!("failed to parse {path} response: {e}")))
    }
}

#[async_trait]
impl ThoughtService for HttpThoughtService {
    async fn generate_thought(&self, request: GenerationRequest) -> Result<Thought, ServiceError> {
        let thought: Thought = self.post("/thoughts/generate", &request).await?;
        validate_candidate(thought)
    }

    async fn articulate_thoughts(
        &self,
        thoughts: &[Thought],
        memory: &Memory,
    ) -> Result<Articulation, ServiceError> {
        self.post("/thoughts/articulate", &ArticulateBody { thoughts, memory })
            .await
    }

    async fn create_memory(
        &self,
        kind: MemoryKind,
        text: &str,
    ) -> Result<MemoryItem, ServiceError> {
        self.post("/memories", &MemoryBody { kind, text }).await
    }

    fn name(&self) -> &str {
        "http"
    }
}
