//! Structured output engine
//!
//! Turns "give me data matching this schema" into an IR request, runs it
//! against any [`BackendAdapter`], and locates, parses, and validates the
//! returned payload. Four extraction modes are supported ([`ExtractionMode`]):
//! tool injection, provider JSON mode, provider JSON-schema mode, and a
//! fenced-markdown fallback for models with no native support.
//!
//! The streaming path reassembles tool-call arguments that arrive as
//! interleaved string fragments, emitting best-effort snapshots as each
//! payload grows and validating the reassembled result exactly like the
//! non-streaming path.

pub mod accumulate;
pub mod cache;
pub mod partial_json;

pub use accumulate::{CompletedToolCall, ToolCallAccumulator};
pub use cache::{ExtractionSchema, SchemaId};
pub use partial_json::parse_partial;

use std::pin::Pin;

use futures::Stream;
use futures_util::StreamExt;
use serde_json::Value;

use crate::error::GatewayError;
use crate::traits::BackendAdapter;
use crate::types::{
    ChatRequest, ChatResponse, ContentPart, ExtractionMode, Message, SchemaDirective, StreamChunk,
    ToolChoice,
};
use crate::utils::CancelHandle;
use cache::SchemaCache;

/// Instruction prepended to the conversation in `MdJson` mode.
const MD_JSON_INSTRUCTION: &str = "Respond with a single fenced ```json code block \
containing only a JSON document that matches the requested structure. \
Do not include any text outside the code block.";

/// How an extraction run should behave.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub mode: ExtractionMode,
    /// When false, schema-validation failures become warnings on the result
    /// instead of errors.
    pub validate: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Tools,
            validate: true,
        }
    }
}

impl ExtractOptions {
    pub fn new(mode: ExtractionMode) -> Self {
        Self {
            mode,
            validate: true,
        }
    }

    pub const fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// Result of a non-streaming extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub value: Value,
    /// Non-fatal issues, e.g. validation failures with `validate = false`.
    pub warnings: Vec<String>,
}

/// Item of an extraction stream.
#[derive(Debug, Clone)]
pub enum ExtractionChunk {
    /// Best-effort snapshot of a payload still being streamed. `id` is the
    /// tool-call id, or `None` for text-mode extraction.
    Partial { id: Option<String>, value: Value },
    /// A fully reassembled, validated payload.
    Final {
        id: Option<String>,
        value: Value,
        warnings: Vec<String>,
    },
}

pub type ExtractionStream =
    Pin<Box<dyn Stream<Item = Result<ExtractionChunk, GatewayError>> + Send>>;

/// Schema-driven extraction against any backend.
#[derive(Default)]
pub struct StructuredOutputEngine {
    cache: SchemaCache,
}

impl StructuredOutputEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cached conversions for one schema registration.
    pub fn invalidate_schema(&self, id: SchemaId) {
        self.cache.invalidate(id);
    }

    /// Drop all cached conversions.
    pub fn clear_schema_cache(&self) {
        self.cache.clear();
    }

    /// Build the IR request for one extraction run.
    ///
    /// `Tools` injects the schema as a forced tool call; `Json` and
    /// `JsonSchema` attach the schema directive for the backend to express
    /// natively; `MdJson` prepends a system instruction asking for a fenced
    /// block.
    pub fn build_request(
        &self,
        messages: Vec<Message>,
        schema: &ExtractionSchema,
        options: &ExtractOptions,
    ) -> Result<ChatRequest, GatewayError> {
        let entry = self.cache.get_or_compile(schema)?;

        let mut messages = messages;
        if options.mode == ExtractionMode::MdJson {
            messages.insert(0, Message::system(MD_JSON_INSTRUCTION).build());
        }

        let directive = SchemaDirective::new(schema.schema().clone(), options.mode)
            .with_name(schema.name())
            .with_validate(options.validate);

        let mut request = ChatRequest::new(messages).with_schema(directive);
        if options.mode == ExtractionMode::Tools {
            request = request
                .with_tools(vec![entry.tool.clone()])
                .with_tool_choice(ToolChoice::tool(schema.name()));
        }
        Ok(request)
    }

    /// One-shot extraction: build, execute, locate, parse, validate.
    pub async fn extract(
        &self,
        backend: &dyn BackendAdapter,
        messages: Vec<Message>,
        schema: &ExtractionSchema,
        options: &ExtractOptions,
    ) -> Result<Extraction, GatewayError> {
        let request = self.build_request(messages, schema, options)?;
        let response = backend.execute(request, CancelHandle::new()).await?;
        self.parse_response(&response, schema, options)
    }

    /// Locate and validate the payload in an already-received response.
    pub fn parse_response(
        &self,
        response: &ChatResponse,
        schema: &ExtractionSchema,
        options: &ExtractOptions,
    ) -> Result<Extraction, GatewayError> {
        let entry = self.cache.get_or_compile(schema)?;

        let value = match options.mode {
            ExtractionMode::Tools => locate_tool_payload(response, schema.name())?,
            ExtractionMode::Json | ExtractionMode::JsonSchema | ExtractionMode::MdJson => {
                let text = response.content_text().ok_or_else(|| {
                    GatewayError::conversion("extraction", "response contains no text content")
                })?;
                parse_payload_text(text, options.mode)?
            }
        };

        let mut warnings = Vec::new();
        if let Some(errors) = entry.validation_errors(&value) {
            if options.validate {
                return Err(GatewayError::validation(format!(
                    "extracted payload failed schema validation: {errors}"
                )));
            }
            tracing::warn!(schema = schema.name(), %errors, "extraction validation failed");
            warnings.push(format!("schema validation failed: {errors}"));
        }
        Ok(Extraction { value, warnings })
    }

    /// Streaming extraction.
    ///
    /// Tool-call argument fragments are accumulated per call id and surfaced
    /// as [`ExtractionChunk::Partial`] snapshots; text-mode streams snapshot
    /// the accumulated assistant text instead. Accumulation buffers live
    /// only until the stream's terminal chunk, at which point every
    /// reassembled payload is validated and emitted as
    /// [`ExtractionChunk::Final`].
    pub async fn extract_stream(
        &self,
        backend: &dyn BackendAdapter,
        messages: Vec<Message>,
        schema: &ExtractionSchema,
        options: &ExtractOptions,
    ) -> Result<ExtractionStream, GatewayError> {
        let entry = self.cache.get_or_compile(schema)?;
        let mut request = self.build_request(messages, schema, options)?;
        request.stream = true;

        let mut inner = backend.execute_stream(request, CancelHandle::new()).await?;
        let options = *options;
        let schema_name = schema.name().to_string();

        let stream = async_stream::stream! {
            let mut acc = ToolCallAccumulator::new();
            let mut text = String::new();

            while let Some(item) = inner.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                match chunk {
                    StreamChunk::ToolUse { id, name, input_delta, .. } => {
                        acc.push(&id, name.as_deref(), input_delta.as_deref());
                        if let Some(value) = acc.snapshot(&id) {
                            yield Ok(ExtractionChunk::Partial { id: Some(id), value });
                        }
                    }
                    StreamChunk::Content { delta, .. } => {
                        text.push_str(&delta);
                        if options.mode != ExtractionMode::Tools {
                            let visible = visible_json(&text, options.mode);
                            let value = parse_partial(visible);
                            if !value.is_null() {
                                yield Ok(ExtractionChunk::Partial { id: None, value });
                            }
                        }
                    }
                    StreamChunk::Error { message } => {
                        yield Err(GatewayError::Network(message));
                        return;
                    }
                    StreamChunk::Done { .. } => {
                        let calls = acc.finish();
                        if calls.is_empty() {
                            match finalize_text(&text, &options, &entry, &schema_name) {
                                Ok(chunk) => yield Ok(chunk),
                                Err(e) => yield Err(e),
                            }
                        } else {
                            for call in calls {
                                let mut warnings = Vec::new();
                                if let Some(errors) = entry.validation_errors(&call.arguments) {
                                    if options.validate {
                                        yield Err(GatewayError::validation(format!(
                                            "extracted payload failed schema validation: {errors}"
                                        )));
                                        return;
                                    }
                                    tracing::warn!(
                                        schema = %schema_name,
                                        call_id = %call.id,
                                        %errors,
                                        "extraction validation failed"
                                    );
                                    warnings.push(format!("schema validation failed: {errors}"));
                                }
                                yield Ok(ExtractionChunk::Final {
                                    id: Some(call.id),
                                    value: call.arguments,
                                    warnings,
                                });
                            }
                        }
                        return;
                    }
                    StreamChunk::Start | StreamChunk::Metadata { .. } => {}
                }
            }
            // The transport died without Done or Error; the buffered payloads
            // are incomplete, so report the break instead of ending silently.
            yield Err(GatewayError::Network(
                "stream ended without a terminal chunk".into(),
            ));
        };
        Ok(Box::pin(stream))
    }
}

fn finalize_text(
    text: &str,
    options: &ExtractOptions,
    entry: &cache::CachedSchema,
    schema_name: &str,
) -> Result<ExtractionChunk, GatewayError> {
    let value = parse_payload_text(text, options.mode)?;
    let mut warnings = Vec::new();
    if let Some(errors) = entry.validation_errors(&value) {
        if options.validate {
            return Err(GatewayError::validation(format!(
                "extracted payload failed schema validation: {errors}"
            )));
        }
        tracing::warn!(schema = %schema_name, %errors, "extraction validation failed");
        warnings.push(format!("schema validation failed: {errors}"));
    }
    Ok(ExtractionChunk::Final {
        id: None,
        value,
        warnings,
    })
}

/// First forced tool call matching the schema name, falling back to the
/// first tool call of any name.
fn locate_tool_payload(response: &ChatResponse, name: &str) -> Result<Value, GatewayError> {
    let tool_uses = response.tool_uses();
    let chosen = tool_uses
        .iter()
        .find(|part| matches!(part, ContentPart::ToolUse { name: n, .. } if n == name))
        .or_else(|| tool_uses.first());
    match chosen {
        Some(ContentPart::ToolUse { input, .. }) => Ok(input.clone()),
        _ => Err(GatewayError::conversion(
            "extraction",
            "response contains no tool call payload",
        )),
    }
}

/// Parse the JSON document embedded in assistant text.
fn parse_payload_text(text: &str, mode: ExtractionMode) -> Result<Value, GatewayError> {
    let candidate = visible_json(text, mode);
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(value);
    }
    // Models often wrap the document in prose; take the outermost braces.
    if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&candidate[start..=end])
    {
        return Ok(value);
    }
    Err(GatewayError::conversion(
        "extraction",
        "assistant text contains no parseable JSON document",
    ))
}

/// The portion of assistant text that should be treated as JSON — for
/// `MdJson`, the inside of the first fenced block (open fence alone is
/// enough, so this also works on a truncated stream).
fn visible_json(text: &str, mode: ExtractionMode) -> &str {
    if mode != ExtractionMode::MdJson {
        return text.trim();
    }
    let Some(fence) = text.find("```") else {
        return text.trim();
    };
    let after = &text[fence + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}
