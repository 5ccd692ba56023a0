//! The generation service seam.
//!
//! Sessions talk to a [`ThoughtService`] to turn a trigger into a candidate
//! thought, to articulate the active thoughts into a reply, and to record
//! memories. [`build_service`] picks the HTTP backend when a base URL is
//! configured and the offline generator otherwise.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tc_core::{Memory, MemoryItem, MemoryKind, Thought, TriggerKind};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::http::HttpThoughtService;
use crate::local::LocalThoughtService;

/// Everything the generator sees when a trigger fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub event_text: String,
    pub event_type: TriggerKind,
    pub thoughts: Vec<Thought>,
    pub memory: Memory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Articulation {
    pub response: String,
}

#[async_trait]
pub trait ThoughtService: Send + Sync {
    async fn generate_thought(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Thought, ServiceError>;

    async fn articulate_thoughts(
        &self,
        thoughts: &[Thought],
        memory: &Memory,
    ) -> std::result::Result<Articulation, ServiceError>;

    async fn create_memory(
        &self,
        kind: MemoryKind,
        text: &str,
    ) -> std::result::Result<MemoryItem, ServiceError>;

    fn name(&self) -> &str;
}

/// Reject candidates the lifecycle cannot use and clamp the rest.
pub fn validate_candidate(mut thought: Thought) -> std::result::Result<Thought, ServiceError> {
    if thought.text().trim().is_empty() {
        return Err(ServiceError::Invalid("thought has empty text".to_string()));
    }
    if let Some(embedding) = thought.embedding()
        && embedding.iter().any(|v| !v.is_finite())
    {
        return Err(ServiceError::Invalid(
            "embedding contains non-finite values".to_string(),
        ));
    }
    thought.score.normalize();
    thought.active = true;
    thought.removing = false;
    Ok(thought)
}

pub fn build_service(config: &ServiceConfig) -> Result<Arc<dyn ThoughtService>> {
    match &config.base_url {
        Some(url) => {
            let service = HttpThoughtService::new(url, config.timeout())?;
            tracing::info!("using generation service at {url}");
            Ok(Arc::new(service))
        }
        None => {
            tracing::info!("no service configured, using offline generator");
            Ok(Arc::new(LocalThoughtService::new()))
        }
    }
}
