//! Middleware Engine
//!
//! Onion-style composition of hooks around a request or a stream: middleware
//! *i* receives a [`Next`] continuation that, when run, invokes middleware
//! *i+1* and ultimately the terminal handler (the real backend call). A
//! middleware may inspect or rewrite the request, run `next` zero or more
//! times, short-circuit by not running it, or fail.
//!
//! `Next` is an explicit cursor over the registered stack rather than
//! source-level recursion, so the same mechanism drives both the request and
//! the stream chains.
//!
//! The chain is locked on first execution: registering afterwards is a
//! programming error and is reported, because mutating middleware order
//! mid-flight would make concurrent requests non-deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::GatewayError;
use crate::types::{ChatRequest, ChatResponse, ChatStream};

/// Terminal handler for the non-streaming chain.
pub type Handler =
    dyn Fn(ChatRequest) -> BoxFuture<'static, Result<ChatResponse, GatewayError>> + Send + Sync;

/// Terminal handler for the streaming chain.
pub type StreamHandler =
    dyn Fn(ChatRequest) -> BoxFuture<'static, Result<ChatStream, GatewayError>> + Send + Sync;

/// Request middleware.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        request: ChatRequest,
        next: Next<'_>,
    ) -> Result<ChatResponse, GatewayError>;
}

/// Stream middleware; structurally identical to [`Middleware`], but the
/// terminal handler yields a lazy chunk sequence.
#[async_trait]
pub trait StreamMiddleware: Send + Sync {
    async fn handle(
        &self,
        request: ChatRequest,
        next: StreamNext<'_>,
    ) -> Result<ChatStream, GatewayError>;
}

/// Continuation into the remainder of the non-streaming chain.
///
/// Copyable so a middleware can run the tail more than once.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stack: &'a [Arc<dyn Middleware>],
    terminal: &'a Handler,
}

impl Next<'_> {
    /// Run the rest of the chain with the given request.
    pub async fn run(mut self, request: ChatRequest) -> Result<ChatResponse, GatewayError> {
        if let Some((first, rest)) = self.stack.split_first() {
            self.stack = rest;
            first.handle(request, self).await
        } else {
            (self.terminal)(request).await
        }
    }
}

/// Continuation into the remainder of the streaming chain.
#[derive(Clone, Copy)]
pub struct StreamNext<'a> {
    stack: &'a [Arc<dyn StreamMiddleware>],
    terminal: &'a StreamHandler,
}

impl StreamNext<'_> {
    /// Run the rest of the chain with the given request.
    pub async fn run(mut self, request: ChatRequest) -> Result<ChatStream, GatewayError> {
        if let Some((first, rest)) = self.stack.split_first() {
            self.stack = rest;
            first.handle(request, self).await
        } else {
            (self.terminal)(request).await
        }
    }
}

/// Registered middleware stacks plus the lock taken on first execution.
#[derive(Default)]
pub struct MiddlewareChain {
    stack: Vec<Arc<dyn Middleware>>,
    stream_stack: Vec<Arc<dyn StreamMiddleware>>,
    locked: AtomicBool,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request middleware. Fails once the chain has executed.
    pub fn register(&mut self, middleware: Arc<dyn Middleware>) -> Result<(), GatewayError> {
        self.ensure_unlocked()?;
        self.stack.push(middleware);
        Ok(())
    }

    /// Register a stream middleware. Fails once the chain has executed.
    pub fn register_stream(
        &mut self,
        middleware: Arc<dyn StreamMiddleware>,
    ) -> Result<(), GatewayError> {
        self.ensure_unlocked()?;
        self.stream_stack.push(middleware);
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), GatewayError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(GatewayError::Middleware {
                message: "middleware chain is locked: registration after first execution".into(),
                request_id: None,
            });
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Whether any request middleware is registered.
    pub fn has_request_middleware(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Whether any stream middleware is registered.
    pub fn has_stream_middleware(&self) -> bool {
        !self.stream_stack.is_empty()
    }

    /// Run the non-streaming chain, terminating in `terminal`.
    pub async fn run(
        &self,
        request: ChatRequest,
        terminal: &Handler,
    ) -> Result<ChatResponse, GatewayError> {
        self.locked.store(true, Ordering::SeqCst);
        let next = Next {
            stack: &self.stack,
            terminal,
        };
        next.run(request).await
    }

    /// Run the streaming chain, terminating in `terminal`.
    pub async fn run_stream(
        &self,
        request: ChatRequest,
        terminal: &StreamHandler,
    ) -> Result<ChatStream, GatewayError> {
        self.locked.store(true, Ordering::SeqCst);
        let next = StreamNext {
            stack: &self.stream_stack,
            terminal,
        };
        next.run(request).await
    }
}

/// Tag a foreign failure as a middleware error, leaving already-typed
/// gateway errors untouched.
///
/// Apply only to errors that passed through a registered middleware frame;
/// an `Internal` from a bare backend call keeps its own classification.
pub fn wrap_middleware_error(error: GatewayError, request_id: Option<&str>) -> GatewayError {
    match error {
        GatewayError::Internal(message) => GatewayError::Middleware {
            message,
            request_id: request_id.map(str::to_string),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, MessageContent};
    use std::sync::atomic::AtomicU32;

    fn echo_terminal() -> Box<Handler> {
        Box::new(|req: ChatRequest| {
            Box::pin(async move {
                let text = req
                    .messages
                    .last()
                    .and_then(|m| m.content_text())
                    .unwrap_or_default()
                    .to_string();
                Ok(ChatResponse::new(MessageContent::Text(text)))
            })
        })
    }

    struct AppendSuffix(&'static str);

    #[async_trait]
    impl Middleware for AppendSuffix {
        async fn handle(
            &self,
            mut request: ChatRequest,
            next: Next<'_>,
        ) -> Result<ChatResponse, GatewayError> {
            if let Some(m) = request.messages.last_mut() {
                if let MessageContent::Text(t) = &mut m.content {
                    t.push_str(self.0);
                }
            }
            next.run(request).await
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(
            &self,
            _request: ChatRequest,
            _next: Next<'_>,
        ) -> Result<ChatResponse, GatewayError> {
            Ok(ChatResponse::new(MessageContent::Text("cached".into())))
        }
    }

    struct CountCalls(Arc<AtomicU32>);

    #[async_trait]
    impl Middleware for CountCalls {
        async fn handle(
            &self,
            request: ChatRequest,
            next: Next<'_>,
        ) -> Result<ChatResponse, GatewayError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            next.run(request).await
        }
    }

    #[tokio::test]
    async fn chain_runs_in_onion_order() {
        let mut chain = MiddlewareChain::new();
        chain.register(Arc::new(AppendSuffix("-a"))).unwrap();
        chain.register(Arc::new(AppendSuffix("-b"))).unwrap();

        let req = ChatRequest::new(vec![Message::user("base").build()]);
        let terminal = echo_terminal();
        let resp = chain.run(req, terminal.as_ref()).await.unwrap();
        assert_eq!(resp.content_text(), Some("base-a-b"));
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut chain = MiddlewareChain::new();
        chain.register(Arc::new(ShortCircuit)).unwrap();
        chain.register(Arc::new(CountCalls(counter.clone()))).unwrap();

        let req = ChatRequest::new(vec![Message::user("ignored").build()]);
        let terminal = echo_terminal();
        let resp = chain.run(req, terminal.as_ref()).await.unwrap();
        assert_eq!(resp.content_text(), Some("cached"));
        // Downstream middleware never ran.
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registration_after_execution_is_reported() {
        let mut chain = MiddlewareChain::new();
        let req = ChatRequest::new(vec![Message::user("x").build()]);
        let terminal = echo_terminal();
        chain.run(req, terminal.as_ref()).await.unwrap();

        let err = chain.register(Arc::new(ShortCircuit)).unwrap_err();
        assert!(matches!(err, GatewayError::Middleware { .. }));
        assert!(chain.is_locked());
    }

    #[tokio::test]
    async fn empty_chain_hits_terminal_directly() {
        let chain = MiddlewareChain::new();
        let req = ChatRequest::new(vec![Message::user("direct").build()]);
        let terminal = echo_terminal();
        let resp = chain.run(req, terminal.as_ref()).await.unwrap();
        assert_eq!(resp.content_text(), Some("direct"));
    }

    #[test]
    fn wrap_leaves_typed_errors_alone() {
        let typed = GatewayError::provider(503, "busy");
        assert!(matches!(
            wrap_middleware_error(typed, Some("req-1")),
            GatewayError::Provider { .. }
        ));

        let foreign = GatewayError::internal("oops");
        assert!(matches!(
            wrap_middleware_error(foreign, Some("req-1")),
            GatewayError::Middleware { .. }
        ));
    }
}
