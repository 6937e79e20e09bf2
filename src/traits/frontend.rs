//! Frontend adapter contract

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::error::GatewayError;
use crate::types::{ChatRequest, ChatResponse, ChatStream, StreamChunk};

/// Converts between one client-facing wire format and the IR.
///
/// The associated types pin the client dialect at compile time; a bridge is
/// constructed for exactly one frontend.
pub trait FrontendAdapter: Send + Sync {
    /// Client request shape.
    type Request;
    /// Client response shape.
    type Response;
    /// Client streaming chunk shape.
    type Chunk: Send + 'static;

    /// Convert a client request into an IR request.
    fn to_ir(&self, request: Self::Request) -> Result<ChatRequest, GatewayError>;

    /// Convert an IR response into a client response.
    fn from_ir(&self, response: ChatResponse) -> Result<Self::Response, GatewayError>;

    /// Convert an IR chunk stream into a client chunk stream.
    ///
    /// The default maps each chunk through [`FrontendAdapter::chunk_from_ir`],
    /// preserving order and termination.
    fn from_ir_stream(
        &self,
        stream: ChatStream,
    ) -> Pin<Box<dyn Stream<Item = Result<Self::Chunk, GatewayError>> + Send>>
    where
        Self: Sized,
    {
        let name = self.name().to_string();
        let convert = self.chunk_converter();
        Box::pin(stream.map(move |item| match item {
            Ok(chunk) => convert(chunk)
                .ok_or_else(|| GatewayError::conversion(name.clone(), "unmappable stream chunk")),
            Err(e) => Err(e),
        }))
    }

    /// Per-chunk conversion used by the default `from_ir_stream`.
    ///
    /// Returning a closure keeps the stream `'static` without borrowing the
    /// adapter.
    fn chunk_converter(&self) -> Box<dyn Fn(StreamChunk) -> Option<Self::Chunk> + Send>;

    /// Adapter name, recorded in provenance.
    fn name(&self) -> &str;
}

/// Frontend that speaks the IR itself: IR requests in, IR responses out.
///
/// Lets the bridge be used without any client dialect, and serves as the
/// fixture frontend in tests.
#[derive(Debug, Clone, Default)]
pub struct IdentityFrontend;

impl FrontendAdapter for IdentityFrontend {
    type Request = ChatRequest;
    type Response = ChatResponse;
    type Chunk = StreamChunk;

    fn to_ir(&self, request: ChatRequest) -> Result<ChatRequest, GatewayError> {
        Ok(request)
    }

    fn from_ir(&self, response: ChatResponse) -> Result<ChatResponse, GatewayError> {
        Ok(response)
    }

    fn chunk_converter(&self) -> Box<dyn Fn(StreamChunk) -> Option<StreamChunk> + Send> {
        Box::new(Some)
    }

    fn name(&self) -> &str {
        "identity"
    }
}
