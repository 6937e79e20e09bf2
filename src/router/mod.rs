//! Router
//!
//! A [`BackendAdapter`] that fans out to N underlying backends using a
//! selection strategy, a failover chain, a per-backend circuit breaker, and
//! model-name translation. Because it exposes the same contract as any
//! backend adapter, it composes transparently with the bridge.

mod circuit;
mod model_map;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use model_map::{ModelTranslator, PatternRule, TranslationStrategy};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::traits::{AdapterMetadata, BackendAdapter, BackendCapabilities, ModelListing};
use crate::types::{ChatRequest, ChatResponse, ChatStream};
use crate::utils::cancel::CancelHandle;

/// How the router picks the next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingStrategy {
    /// Try candidates in declaration order; fall through on retryable
    /// failures.
    #[default]
    Priority,
    /// Rotate the starting candidate per call, independent of prior
    /// failures.
    RoundRobin,
    /// Candidates whose declared capabilities satisfy the request come
    /// first, in declaration order, then the rest.
    CapabilityBased,
}

/// One routed backend plus its failure-tracking state.
struct RouterBackend {
    name: String,
    adapter: Arc<dyn BackendAdapter>,
    circuit: CircuitBreaker,
    /// Fallback model for hybrid translation.
    default_model: Option<String>,
}

/// Failover-capable backend adapter.
pub struct Router {
    name: String,
    backends: Vec<RouterBackend>,
    strategy: RoutingStrategy,
    translator: ModelTranslator,
    cursor: AtomicUsize,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Breaker state of a named backend, for observability.
    pub fn circuit_state(&self, backend: &str) -> Option<CircuitState> {
        self.backends
            .iter()
            .find(|b| b.name == backend)
            .map(|b| b.circuit.state())
    }

    /// Candidate indices in the order this call should try them.
    fn candidate_order(&self, request: &ChatRequest, streaming: bool) -> Vec<usize> {
        let n = self.backends.len();
        match self.strategy {
            RoutingStrategy::Priority => (0..n).collect(),
            RoutingStrategy::RoundRobin => {
                let start = self.cursor.fetch_add(1, Ordering::SeqCst) % n.max(1);
                (0..n).map(|i| (start + i) % n).collect()
            }
            RoutingStrategy::CapabilityBased => {
                let (capable, rest): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| {
                    satisfies(&self.backends[i].adapter.metadata().capabilities, request, streaming)
                });
                capable.into_iter().chain(rest).collect()
            }
        }
    }

    /// Translate the model name and stamp router provenance for one
    /// candidate.
    fn prepare_request(
        &self,
        request: &ChatRequest,
        backend: &RouterBackend,
    ) -> Result<ChatRequest, GatewayError> {
        let mut prepared = request.clone();
        if prepared.common_params.model.is_empty() {
            if let Some(default) = &backend.default_model {
                prepared.common_params.model = default.clone();
            }
        } else {
            prepared.common_params.model = self.translator.translate(
                &prepared.common_params.model,
                &backend.name,
                backend.default_model.as_deref(),
            )?;
        }
        prepared.metadata.provenance.push_router(&self.name);
        Ok(prepared)
    }

    fn exhausted_error(
        &self,
        attempted: Vec<String>,
        skipped: Vec<String>,
        last_error: Option<GatewayError>,
    ) -> GatewayError {
        let message = match last_error {
            Some(e) => format!(
                "{} of {} backends failed, last error: {e}",
                attempted.len(),
                self.backends.len()
            ),
            None => "no backend was available".to_string(),
        };
        GatewayError::Router {
            message,
            attempted,
            skipped,
        }
    }
}

fn satisfies(caps: &BackendCapabilities, request: &ChatRequest, streaming: bool) -> bool {
    if streaming && !caps.streaming {
        return false;
    }
    if request.tools.as_ref().is_some_and(|t| !t.is_empty()) && !caps.tools {
        return false;
    }
    if request.has_images() && !caps.multi_modal {
        return false;
    }
    true
}

#[async_trait]
impl BackendAdapter for Router {
    async fn execute(
        &self,
        request: ChatRequest,
        cancel: CancelHandle,
    ) -> Result<ChatResponse, GatewayError> {
        let mut attempted = Vec::new();
        let mut skipped = Vec::new();
        let mut last_error = None;

        for idx in self.candidate_order(&request, false) {
            let backend = &self.backends[idx];
            if !backend.circuit.can_execute() {
                tracing::debug!(backend = %backend.name, "skipping backend with open circuit");
                skipped.push(backend.name.clone());
                continue;
            }

            let prepared = self.prepare_request(&request, backend)?;
            attempted.push(backend.name.clone());

            match backend.adapter.execute(prepared, cancel.clone()).await {
                Ok(response) => {
                    backend.circuit.record_success();
                    return Ok(response);
                }
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(backend = %backend.name, error = %e, "backend failed; failing over");
                    backend.circuit.record_failure();
                    last_error = Some(e);
                }
                // A non-retryable error would fail identically everywhere;
                // abort the chain and surface it as-is.
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted_error(attempted, skipped, last_error))
    }

    async fn execute_stream(
        &self,
        request: ChatRequest,
        cancel: CancelHandle,
    ) -> Result<ChatStream, GatewayError> {
        let mut attempted = Vec::new();
        let mut skipped = Vec::new();
        let mut last_error = None;

        for idx in self.candidate_order(&request, true) {
            let backend = &self.backends[idx];
            if !backend.circuit.can_execute() {
                skipped.push(backend.name.clone());
                continue;
            }

            let prepared = self.prepare_request(&request, backend)?;
            attempted.push(backend.name.clone());

            // Failover applies only to opening the stream; once chunks flow,
            // failures belong to the stream itself.
            match backend.adapter.execute_stream(prepared, cancel.clone()).await {
                Ok(stream) => {
                    backend.circuit.record_success();
                    return Ok(stream);
                }
                Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
                Err(e) if e.is_retryable() => {
                    backend.circuit.record_failure();
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted_error(attempted, skipped, last_error))
    }

    async fn list_models(&self) -> Result<Option<ModelListing>, GatewayError> {
        let mut models = Vec::new();
        let mut any_listing = false;
        for backend in &self.backends {
            if let Some(listing) = backend.adapter.list_models().await? {
                any_listing = true;
                for model in listing.models {
                    if !models.contains(&model) {
                        models.push(model);
                    }
                }
            }
        }
        Ok(any_listing.then(|| ModelListing::new(models)))
    }

    async fn health_check(&self) -> bool {
        for backend in &self.backends {
            if backend.adapter.health_check().await {
                return true;
            }
        }
        false
    }

    fn metadata(&self) -> AdapterMetadata {
        // The router advertises the union of its backends' capabilities.
        let mut caps = BackendCapabilities::new();
        for backend in &self.backends {
            let m = backend.adapter.metadata();
            caps.streaming |= m.capabilities.streaming;
            caps.tools |= m.capabilities.tools;
            caps.multi_modal |= m.capabilities.multi_modal;
            caps.max_context_tokens = caps
                .max_context_tokens
                .max(m.capabilities.max_context_tokens);
        }
        AdapterMetadata::new(self.name.clone(), caps)
    }
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    name: String,
    backends: Vec<RouterBackend>,
    strategy: RoutingStrategy,
    translator: ModelTranslator,
    circuit_config: CircuitBreakerConfig,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            name: "router".to_string(),
            backends: Vec::new(),
            strategy: RoutingStrategy::default(),
            translator: ModelTranslator::none(),
            circuit_config: CircuitBreakerConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a candidate backend. Declaration order is priority order.
    pub fn backend(mut self, name: impl Into<String>, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.backends.push(RouterBackend {
            name: name.into(),
            adapter,
            circuit: CircuitBreaker::new(self.circuit_config.clone()),
            default_model: None,
        });
        self
    }

    /// Add a candidate backend with a fallback model for hybrid translation.
    pub fn backend_with_default_model(
        mut self,
        name: impl Into<String>,
        adapter: Arc<dyn BackendAdapter>,
        default_model: impl Into<String>,
    ) -> Self {
        self.backends.push(RouterBackend {
            name: name.into(),
            adapter,
            circuit: CircuitBreaker::new(self.circuit_config.clone()),
            default_model: Some(default_model.into()),
        });
        self
    }

    pub fn strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn translator(mut self, translator: ModelTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Circuit configuration applied to backends added after this call.
    pub fn circuit_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_config = config;
        self
    }

    /// Build the router. Fails when no backend was registered.
    pub fn build(self) -> Result<Router, GatewayError> {
        if self.backends.is_empty() {
            return Err(GatewayError::validation(
                "router requires at least one backend",
            ));
        }
        Ok(Router {
            name: self.name,
            backends: self.backends,
            strategy: self.strategy,
            translator: self.translator,
            cursor: AtomicUsize::new(0),
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
