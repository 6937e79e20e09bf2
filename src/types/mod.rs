//! Intermediate Representation (IR) types
//!
//! The canonical, provider-agnostic request/response/stream-chunk shapes that
//! every conversion passes through. Requests and responses are created once
//! per call and flow read-mostly through the pipeline: each stage returns an
//! augmented copy rather than mutating an instance a previous stage can see.

mod message;
mod metadata;
mod request;
mod response;
mod schema;
mod streaming;

pub use message::{ContentPart, MediaSource, Message, MessageBuilder, MessageContent, MessageRole};
pub use metadata::{Provenance, ProvenanceEntry, ProvenanceStage, RequestMetadata, ResponseMetadata};
pub use request::{ChatRequest, ChatRequestBuilder, CommonParams, Tool, ToolChoice};
pub use response::{ChatResponse, FinishReason, Usage};
pub use schema::{ExtractionMode, SchemaDirective, SchemaType};
pub use streaming::{ChatStream, StreamChunk, StreamMode};
