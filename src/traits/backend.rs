//! Backend adapter contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capabilities::AdapterMetadata;
use crate::error::GatewayError;
use crate::types::{ChatRequest, ChatResponse, ChatStream};
use crate::utils::cancel::CancelHandle;

/// Result of a backend's model listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListing {
    pub models: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ModelListing {
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models,
            fetched_at: Utc::now(),
        }
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Converts an IR request into a call against one specific provider and back.
///
/// Implementations own the transport; honoring the [`CancelHandle`] is their
/// responsibility. The [`crate::router::Router`] implements this same trait,
/// so a multi-backend fan-out composes transparently with the bridge.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Execute a non-streaming chat request.
    async fn execute(
        &self,
        request: ChatRequest,
        cancel: CancelHandle,
    ) -> Result<ChatResponse, GatewayError>;

    /// Execute a streaming chat request.
    async fn execute_stream(
        &self,
        request: ChatRequest,
        cancel: CancelHandle,
    ) -> Result<ChatStream, GatewayError>;

    /// List models available on this backend.
    ///
    /// Backends without a listing capability return `Ok(None)`; the bridge
    /// treats that as "assume available", never as a hard failure.
    async fn list_models(&self) -> Result<Option<ModelListing>, GatewayError> {
        Ok(None)
    }

    /// Lightweight liveness probe.
    async fn health_check(&self) -> bool {
        true
    }

    /// Adapter name and declared capabilities.
    fn metadata(&self) -> AdapterMetadata;
}
