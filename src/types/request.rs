//! Chat request types

use serde::{Deserialize, Serialize};

use super::message::Message;
use super::metadata::RequestMetadata;
use super::schema::SchemaDirective;
use super::streaming::StreamMode;

/// Common sampling parameters.
///
/// All optional; provider capability governs which are honored. An empty
/// `model` means "use the bridge's configured default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonParams {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// A tool the model may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Tool choice strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Model decides whether to call tools.
    Auto,
    /// Model must call at least one tool.
    Required,
    /// Model cannot call any tools.
    None,
    /// Model must call the named tool.
    Tool { name: String },
}

impl ToolChoice {
    pub fn tool(name: impl Into<String>) -> Self {
        Self::Tool { name: name.into() }
    }
}

/// IR chat request.
///
/// Message order is conversation order and is never reordered by the
/// pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub common_params: CommonParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Structured-output directive, when the caller wants schema-shaped
    /// output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDirective>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub stream_mode: StreamMode,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl ChatRequest {
    /// Create a new chat request with messages
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Create a builder for the chat request
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::new()
    }

    /// Add a message to the request
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add tools to the request
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set tool choice strategy
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Attach a schema directive
    pub fn with_schema(mut self, schema: SchemaDirective) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Enable streaming
    pub const fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the streaming presentation mode
    pub const fn with_stream_mode(mut self, mode: StreamMode) -> Self {
        self.stream_mode = mode;
        self
    }

    /// Set common parameters
    pub fn with_common_params(mut self, params: CommonParams) -> Self {
        self.common_params = params;
        self
    }

    /// The request id, when already assigned.
    pub fn request_id(&self) -> Option<&str> {
        self.metadata.request_id.as_deref()
    }

    /// Whether any message carries image content.
    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| m.content.has_images())
    }
}

/// Chat request builder
#[derive(Debug, Clone, Default)]
pub struct ChatRequestBuilder {
    messages: Vec<Message>,
    common_params: CommonParams,
    tools: Option<Vec<Tool>>,
    tool_choice: Option<ToolChoice>,
    schema: Option<SchemaDirective>,
    stream: bool,
    stream_mode: StreamMode,
    metadata: RequestMetadata,
}

impl ChatRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the request
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Add multiple messages to the request
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Add tools to the request
    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set tool choice strategy
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Attach a schema directive
    pub fn schema(mut self, schema: SchemaDirective) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Enable streaming
    pub const fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the streaming presentation mode
    pub const fn stream_mode(mut self, mode: StreamMode) -> Self {
        self.stream_mode = mode;
        self
    }

    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.common_params.model = model.into();
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.common_params.temperature = Some(temperature);
        self
    }

    /// Set the top_p sampling parameter
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.common_params.top_p = Some(top_p);
        self
    }

    /// Set the top_k sampling parameter
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.common_params.top_k = Some(top_k);
        self
    }

    /// Set the maximum number of tokens to generate
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.common_params.max_tokens = Some(max_tokens);
        self
    }

    /// Set an explicit request id
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.metadata.request_id = Some(request_id.into());
        self
    }

    /// Attach a custom metadata entry
    pub fn custom_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.custom.insert(key.into(), value);
        self
    }

    /// Build the chat request
    pub fn build(self) -> ChatRequest {
        ChatRequest {
            messages: self.messages,
            common_params: self.common_params,
            tools: self.tools,
            tool_choice: self.tool_choice,
            schema: self.schema,
            stream: self.stream,
            stream_mode: self.stream_mode,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trip() {
        let req = ChatRequest::builder()
            .message(Message::user("hi").build())
            .model("gpt-4o")
            .temperature(0.2)
            .max_tokens(128)
            .stream(true)
            .build();
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.common_params.model, "gpt-4o");
        assert_eq!(req.common_params.max_tokens, Some(128));
        assert!(req.stream);
    }

    #[test]
    fn request_id_reads_metadata() {
        let req = ChatRequest::builder().request_id("req-1").build();
        assert_eq!(req.request_id(), Some("req-1"));
    }

    #[test]
    fn empty_model_serializes_away() {
        let req = ChatRequest::new(vec![]);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["common_params"].get("model").is_none());
    }
}
