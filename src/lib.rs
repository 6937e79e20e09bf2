//! llmgate
//!
//! Provider-agnostic gateway core for large-language-model APIs.
//!
//! A request enters in one client dialect, is normalized into a canonical
//! intermediate representation (IR), flows through a middleware chain to a
//! backend adapter (possibly a [`router::Router`] fanning out over several
//! backends with failover and circuit breaking), and the result is converted
//! back into the client dialect. The [`bridge::Bridge`] owns that lifecycle:
//! enrichment, validation, retry, statistics, and lifecycle events.
//!
//! The crate is a library-level contract: HTTP transports, per-provider wire
//! translators, and CLI surfaces are external collaborators that plug in
//! through the [`traits::FrontendAdapter`] and [`traits::BackendAdapter`]
//! seams.
#![deny(unsafe_code)]

pub mod bridge;
pub mod error;
pub mod extraction;
pub mod middleware;
pub mod retry;
pub mod router;
pub mod traits;
pub mod types;
pub mod utils;

pub use error::GatewayError;

/// Commonly used types for working with the gateway.
pub mod prelude {
    pub use crate::bridge::{Bridge, BridgeConfig, BridgeEvent, BridgeStats};
    pub use crate::error::GatewayError;
    pub use crate::extraction::{ExtractOptions, ExtractionSchema, StructuredOutputEngine};
    pub use crate::middleware::{Middleware, MiddlewareChain, Next};
    pub use crate::router::{Router, RouterBuilder, RoutingStrategy};
    pub use crate::traits::{
        AdapterMetadata, BackendAdapter, BackendCapabilities, FrontendAdapter, IdentityFrontend,
    };
    pub use crate::types::{
        ChatRequest, ChatResponse, ChatStream, CommonParams, ContentPart, ExtractionMode,
        FinishReason, Message, MessageContent, MessageRole, StreamChunk, StreamMode, Tool, Usage,
    };
    pub use crate::utils::cancel::CancelHandle;
}
