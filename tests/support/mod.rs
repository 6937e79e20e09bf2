//! Shared test fixtures: scripted backend adapters.

use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use llmgate::error::GatewayError;
use llmgate::prelude::*;
use llmgate::traits::AdapterMetadata;
use llmgate::types::Usage;

static TRACING: Once = Once::new();

/// Install the tracing subscriber once per test binary; set `RUST_LOG` to
/// see bridge and extraction warnings while debugging a test.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Backend that answers every request with a fixed text response
/// (`finish_reason: stop`, usage 5/2/7) and counts its calls.
pub struct FixtureBackend {
    pub name: &'static str,
    pub reply: String,
    pub calls: AtomicU32,
}

impl FixtureBackend {
    pub fn new(name: &'static str, reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: reply.into(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for FixtureBackend {
    async fn execute(
        &self,
        request: ChatRequest,
        _cancel: CancelHandle,
    ) -> Result<ChatResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = ChatResponse::new(MessageContent::Text(self.reply.clone()))
            .with_finish_reason(FinishReason::Stop)
            .with_usage(Usage::new(5, 2));
        response.metadata.custom.insert(
            "model".into(),
            serde_json::json!(request.common_params.model),
        );
        Ok(response)
    }

    async fn execute_stream(
        &self,
        _request: ChatRequest,
        _cancel: CancelHandle,
    ) -> Result<ChatStream, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks = vec![
            Ok(StreamChunk::Start),
            Ok(StreamChunk::Content {
                delta: self.reply.clone(),
                sequence: 0,
            }),
            Ok(StreamChunk::Done {
                message: None,
                finish_reason: Some(FinishReason::Stop),
                usage: Some(Usage::new(5, 2)),
            }),
        ];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata::new(self.name, BackendCapabilities::new().with_streaming().with_tools())
    }
}

/// Backend that fails the first `fail_times` calls with the given error
/// factory, then succeeds like [`FixtureBackend`].
pub struct FlakyBackend {
    pub name: &'static str,
    pub fail_times: u32,
    pub calls: AtomicU32,
    pub error: fn(u32) -> GatewayError,
}

impl FlakyBackend {
    pub fn new(name: &'static str, fail_times: u32) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_times,
            calls: AtomicU32::new(0),
            error: |n| GatewayError::provider(500, format!("forced failure on attempt {n}")),
        })
    }

    pub fn with_error(name: &'static str, fail_times: u32, error: fn(u32) -> GatewayError) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_times,
            calls: AtomicU32::new(0),
            error,
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for FlakyBackend {
    async fn execute(
        &self,
        _request: ChatRequest,
        _cancel: CancelHandle,
    ) -> Result<ChatResponse, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_times {
            return Err((self.error)(n));
        }
        Ok(ChatResponse::new(MessageContent::Text("recovered".into()))
            .with_finish_reason(FinishReason::Stop)
            .with_usage(Usage::new(5, 2)))
    }

    async fn execute_stream(
        &self,
        _request: ChatRequest,
        _cancel: CancelHandle,
    ) -> Result<ChatStream, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_times {
            return Err((self.error)(n));
        }
        Ok(Box::pin(futures_util::stream::iter(vec![
            Ok(StreamChunk::Start),
            Ok(StreamChunk::Done {
                message: None,
                finish_reason: Some(FinishReason::Stop),
                usage: None,
            }),
        ])))
    }

    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata::new(self.name, BackendCapabilities::new().with_streaming().with_tools())
    }
}

/// Backend that replays a scripted chunk sequence.
pub struct ScriptedStreamBackend {
    pub name: &'static str,
    pub script: Vec<StreamChunk>,
}

impl ScriptedStreamBackend {
    pub fn new(name: &'static str, script: Vec<StreamChunk>) -> Arc<Self> {
        Arc::new(Self { name, script })
    }
}

#[async_trait]
impl BackendAdapter for ScriptedStreamBackend {
    async fn execute(
        &self,
        _request: ChatRequest,
        _cancel: CancelHandle,
    ) -> Result<ChatResponse, GatewayError> {
        Err(GatewayError::internal("scripted backend is stream-only"))
    }

    async fn execute_stream(
        &self,
        _request: ChatRequest,
        _cancel: CancelHandle,
    ) -> Result<ChatStream, GatewayError> {
        let chunks: Vec<Result<StreamChunk, GatewayError>> =
            self.script.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    fn metadata(&self) -> AdapterMetadata {
        AdapterMetadata::new(self.name, BackendCapabilities::new().with_streaming().with_tools())
    }
}

/// Frontend that accepts any request but cannot represent responses in its
/// client dialect; `from_ir` always fails with a conversion error.
#[allow(dead_code)]
pub struct RejectingFrontend;

impl FrontendAdapter for RejectingFrontend {
    type Request = ChatRequest;
    type Response = ChatResponse;
    type Chunk = StreamChunk;

    fn to_ir(&self, request: ChatRequest) -> Result<ChatRequest, GatewayError> {
        Ok(request)
    }

    fn from_ir(&self, _response: ChatResponse) -> Result<ChatResponse, GatewayError> {
        Err(GatewayError::conversion(
            "rejecting",
            "response has no client representation",
        ))
    }

    fn chunk_converter(&self) -> Box<dyn Fn(StreamChunk) -> Option<StreamChunk> + Send> {
        Box::new(Some)
    }

    fn name(&self) -> &str {
        "rejecting"
    }
}

/// A user request with one message, ready for the identity frontend.
pub fn user_request(text: &str) -> ChatRequest {
    ChatRequest::new(vec![Message::user(text).build()])
}
