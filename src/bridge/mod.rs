//! Bridge
//!
//! Pairs one frontend adapter with one backend adapter and owns the
//! per-request lifecycle: enrichment, validation, the middleware chain,
//! retry, statistics, and lifecycle events.
//!
//! The non-streaming path retries the validate → middleware → backend
//! sequence for retryable errors; the streaming path never retries
//! mid-stream - once bytes have reached the caller, restarting would violate
//! at-most-once delivery, so streaming failures surface immediately as a
//! terminal error chunk.

mod config;
mod events;
mod stats;
mod stream;

pub use config::BridgeConfig;
pub use events::{BridgeEvent, EventBus, EventKind, EventListener};
pub use stats::{BridgeStats, StatsSnapshot};

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::Stream;

use crate::error::GatewayError;
use crate::middleware::{Handler, MiddlewareChain, StreamHandler, wrap_middleware_error};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::traits::{BackendAdapter, FrontendAdapter};
use crate::types::{ChatRequest, ChatResponse, ContentPart, MessageContent, MessageRole};
use crate::utils::cancel::{CancelHandle, cancellable_stream};

/// Request orchestrator pairing one frontend with one backend.
pub struct Bridge<F: FrontendAdapter> {
    frontend: F,
    backend: Arc<dyn BackendAdapter>,
    config: BridgeConfig,
    middleware: MiddlewareChain,
    stats: Arc<BridgeStats>,
    events: Arc<EventBus>,
}

impl<F: FrontendAdapter> Bridge<F> {
    pub fn new(frontend: F, backend: Arc<dyn BackendAdapter>) -> Self {
        Self::with_config(frontend, backend, BridgeConfig::default())
    }

    pub fn with_config(
        frontend: F,
        backend: Arc<dyn BackendAdapter>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            frontend,
            backend,
            config,
            middleware: MiddlewareChain::new(),
            stats: Arc::new(BridgeStats::new()),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Register a request middleware. Fails once the chain is locked.
    pub fn register_middleware(
        &mut self,
        middleware: Arc<dyn crate::middleware::Middleware>,
    ) -> Result<(), GatewayError> {
        self.middleware.register(middleware)
    }

    /// Register a stream middleware. Fails once the chain is locked.
    pub fn register_stream_middleware(
        &mut self,
        middleware: Arc<dyn crate::middleware::StreamMiddleware>,
    ) -> Result<(), GatewayError> {
        self.middleware.register_stream(middleware)
    }

    /// Subscribe to lifecycle events.
    pub fn on_event(&self, kind: EventKind, listener: EventListener) {
        self.events.subscribe(kind, listener);
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Non-streaming chat call.
    pub async fn chat(&self, request: F::Request) -> Result<F::Response, GatewayError> {
        self.chat_with_cancel(request, CancelHandle::new()).await
    }

    /// Non-streaming chat call with an external cancellation handle.
    pub async fn chat_with_cancel(
        &self,
        request: F::Request,
        cancel: CancelHandle,
    ) -> Result<F::Response, GatewayError> {
        let started = Instant::now();
        let ir = self.frontend.to_ir(request)?;
        let ir = self.enrich_request(ir);
        let request_id = ir.request_id().unwrap_or_default().to_string();

        self.stats.record_request_start();
        self.events.emit(&BridgeEvent::RequestStart {
            request_id: request_id.clone(),
        });
        if self.config.debug {
            tracing::debug!(request_id = %request_id, messages = ir.messages.len(), "request start");
        }

        // Success is only recorded once the frontend conversion has also
        // succeeded; a response the caller never receives is not a success.
        let result = match self.execute_ir(&ir, &cancel).await {
            Ok(response) => self.frontend.from_ir(self.enrich_response(response, &ir)),
            Err(error) => Err(error),
        };

        match result {
            Ok(converted) => {
                self.stats.record_success(started.elapsed());
                self.events.emit(&BridgeEvent::RequestSuccess {
                    request_id: request_id.clone(),
                    latency: started.elapsed(),
                });
                Ok(converted)
            }
            Err(GatewayError::Cancelled) => {
                // Caller abandoned the request; not a reportable failure.
                Err(GatewayError::Cancelled)
            }
            Err(error) => {
                self.stats.record_failure(error.code());
                self.events.emit(&BridgeEvent::RequestError {
                    request_id,
                    code: error.code(),
                });
                Err(error)
            }
        }
    }

    /// Streaming chat call.
    pub async fn chat_stream(
        &self,
        request: F::Request,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<F::Chunk, GatewayError>> + Send>>, GatewayError>
    {
        self.chat_stream_with_cancel(request, CancelHandle::new())
            .await
    }

    /// Streaming chat call with an external cancellation handle.
    pub async fn chat_stream_with_cancel(
        &self,
        request: F::Request,
        cancel: CancelHandle,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<F::Chunk, GatewayError>> + Send>>, GatewayError>
    {
        let ir = self.frontend.to_ir(request)?;
        let mut ir = self.enrich_request(ir);
        ir.stream = true;
        let request_id = ir.request_id().unwrap_or_default().to_string();

        validate_request(&ir)?;

        self.stats.record_stream_start();
        self.events.emit(&BridgeEvent::StreamStart {
            request_id: request_id.clone(),
        });

        let backend = Arc::clone(&self.backend);
        let stream_cancel = cancel.clone();
        let terminal: Box<StreamHandler> = Box::new(move |req: ChatRequest| {
            let backend = Arc::clone(&backend);
            let cancel = stream_cancel.clone();
            Box::pin(async move { backend.execute_stream(req, cancel).await })
        });

        let mode = ir.stream_mode;
        let has_middleware = self.middleware.has_stream_middleware();
        let inner = self
            .middleware
            .run_stream(ir, terminal.as_ref())
            .await
            .map_err(|e| {
                let wrapped = if has_middleware {
                    wrap_middleware_error(e, Some(&request_id))
                } else {
                    e
                };
                self.stats.record_failure(wrapped.code());
                self.events.emit(&BridgeEvent::StreamError {
                    request_id: request_id.clone(),
                    message: wrapped.to_string(),
                });
                wrapped
            })?;

        let guarded = stream::guard_stream(
            cancellable_stream(inner, cancel),
            mode,
            Arc::clone(&self.stats),
            Arc::clone(&self.events),
            request_id,
        );
        Ok(self.frontend.from_ir_stream(guarded))
    }

    /// Whether the backend claims to serve `model`.
    ///
    /// A backend without a model listing reports "assume available":
    /// cross-provider model translation means the literal id is not required
    /// to exist on the chosen backend.
    pub async fn has_model(&self, model: &str) -> Result<bool, GatewayError> {
        match self.backend.list_models().await? {
            Some(listing) => Ok(listing.contains(model)),
            None => Ok(true),
        }
    }

    /// Pre-flight model check; fails with a validation error only when the
    /// backend positively reports the model is absent.
    pub async fn validate_model(&self, model: &str) -> Result<(), GatewayError> {
        if self.has_model(model).await? {
            Ok(())
        } else {
            Err(GatewayError::validation(format!(
                "model '{model}' is not available on backend '{}'",
                self.backend.metadata().name
            )))
        }
    }

    /// Retry loop around the validate → middleware → backend sequence.
    async fn execute_ir(
        &self,
        ir: &ChatRequest,
        cancel: &CancelHandle,
    ) -> Result<ChatResponse, GatewayError> {
        let executor = RetryExecutor::new(RetryPolicy::with_retries(self.config.retries));
        let request_id = ir.request_id().map(str::to_string);

        executor
            .execute(|attempt| {
                let mut request = ir.clone();
                if attempt > 0 {
                    // Same logical id; the attempt counter is for correlation.
                    request
                        .metadata
                        .custom
                        .insert("attempt".into(), serde_json::json!(attempt + 1));
                }
                let backend = Arc::clone(&self.backend);
                let cancel = cancel.clone();
                let timeout = self.config.timeout;
                let middleware = &self.middleware;
                let request_id = request_id.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Err(GatewayError::Cancelled);
                    }
                    validate_request(&request)?;

                    let terminal: Box<Handler> = Box::new(move |req: ChatRequest| {
                        let backend = Arc::clone(&backend);
                        let cancel = cancel.clone();
                        Box::pin(async move {
                            match tokio::time::timeout(timeout, backend.execute(req, cancel)).await
                            {
                                Ok(result) => result,
                                Err(_) => Err(GatewayError::Timeout { elapsed: timeout }),
                            }
                        })
                    });

                    let crossed_middleware = middleware.has_request_middleware();
                    middleware.run(request, terminal.as_ref()).await.map_err(|e| {
                        if crossed_middleware {
                            wrap_middleware_error(e, request_id.as_deref())
                        } else {
                            e
                        }
                    })
                }
            })
            .await
    }

    /// Stamp id, timestamp, default model, and frontend provenance.
    fn enrich_request(&self, mut ir: ChatRequest) -> ChatRequest {
        if ir.metadata.request_id.is_none() && self.config.auto_request_id {
            ir.metadata.request_id = Some(uuid::Uuid::new_v4().to_string());
        }
        if ir.metadata.timestamp.is_none() {
            ir.metadata.timestamp = Some(chrono::Utc::now());
        }
        if ir.common_params.model.is_empty() {
            if let Some(model) = &self.config.default_model {
                ir.common_params.model = model.clone();
            }
        }
        ir.metadata.provenance.push_frontend(self.frontend.name());
        ir
    }

    /// Carry the request id and provenance into the response, appending the
    /// backend hop.
    fn enrich_response(&self, mut response: ChatResponse, ir: &ChatRequest) -> ChatResponse {
        response.metadata.request_id = ir.metadata.request_id.clone();
        let mut provenance = ir.metadata.provenance.clone();
        provenance.push_backend(self.backend.metadata().name);
        response.metadata.provenance = provenance;
        response
    }
}

/// Structural checks on the enriched IR request. Failures are never
/// retryable and never reach the backend.
pub(crate) fn validate_request(request: &ChatRequest) -> Result<(), GatewayError> {
    if request.messages.is_empty() {
        return Err(GatewayError::validation(
            "request must contain at least one message",
        ));
    }

    let mut issued_tool_use_ids: HashSet<&str> = HashSet::new();
    for message in &request.messages {
        if message.role == MessageRole::Tool {
            let Some(parts) = message.content.as_parts() else {
                return Err(GatewayError::validation(
                    "tool message content must be tool_result blocks",
                ));
            };
            for part in parts {
                match part {
                    ContentPart::ToolResult { tool_use_id, .. } => {
                        if !issued_tool_use_ids.contains(tool_use_id.as_str()) {
                            return Err(GatewayError::validation(format!(
                                "tool_result references unknown tool_use id '{tool_use_id}'"
                            )));
                        }
                    }
                    _ => {
                        return Err(GatewayError::validation(
                            "tool message may contain only tool_result blocks",
                        ));
                    }
                }
            }
        } else if let MessageContent::Parts(parts) = &message.content {
            for part in parts {
                if let ContentPart::ToolUse { id, .. } = part {
                    issued_tool_use_ids.insert(id);
                }
            }
        }
    }

    if let Some(tools) = &request.tools {
        for tool in tools {
            if tool.name.is_empty() {
                return Err(GatewayError::validation("tool name must not be empty"));
            }
            if !tool.parameters.is_object() {
                return Err(GatewayError::validation(format!(
                    "tool '{}' parameters must be a JSON object",
                    tool.name
                )));
            }
        }
    }

    if let Some(schema) = &request.schema {
        if !schema.schema.is_object() {
            return Err(GatewayError::validation(
                "schema directive must carry a JSON object schema",
            ));
        }
    }

    Ok(())
}
