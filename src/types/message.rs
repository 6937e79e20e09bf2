//! IR messages and content blocks

use serde::{Deserialize, Serialize};

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Media source - unified way to represent media data across providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaSource {
    /// URL (http, https, gs, data URLs, etc.)
    Url { url: String },
    /// Base64-encoded data
    Base64 { data: String },
}

impl MediaSource {
    /// Create from URL string
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Create from base64 string
    pub fn base64(data: impl Into<String>) -> Self {
        Self::Base64 { data: data.into() }
    }
}

/// A typed content block inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },
    /// Image content
    Image { source: MediaSource },
    /// A tool invocation issued by the assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The result of a tool invocation, referencing the originating call
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// Message content - plain text or an ordered sequence of typed blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Ordered content blocks
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Extract text content if available.
    ///
    /// For block content, returns the first text block found.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(parts) => parts.iter().find_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    /// Concatenate all text blocks.
    pub fn all_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => {
                let mut result = String::new();
                for part in parts {
                    if let ContentPart::Text { text } = part {
                        if !result.is_empty() {
                            result.push(' ');
                        }
                        result.push_str(text);
                    }
                }
                result
            }
        }
    }

    /// Get content blocks if this is block content.
    pub fn as_parts(&self) -> Option<&[ContentPart]> {
        match self {
            MessageContent::Parts(parts) => Some(parts),
            MessageContent::Text(_) => None,
        }
    }

    /// Whether any block carries image data.
    pub fn has_images(&self) -> bool {
        matches!(self, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, ContentPart::Image { .. })))
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    /// Start building a system message.
    pub fn system(content: impl Into<MessageContent>) -> MessageBuilder {
        MessageBuilder::new(MessageRole::System, content)
    }

    /// Start building a user message.
    pub fn user(content: impl Into<MessageContent>) -> MessageBuilder {
        MessageBuilder::new(MessageRole::User, content)
    }

    /// Start building an assistant message.
    pub fn assistant(content: impl Into<MessageContent>) -> MessageBuilder {
        MessageBuilder::new(MessageRole::Assistant, content)
    }

    /// Build a tool message carrying a single tool result.
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }]),
        }
    }

    /// Convenience accessor for the first text block.
    pub fn content_text(&self) -> Option<&str> {
        self.content.text()
    }

    /// Tool-use blocks carried by this message, in order.
    pub fn tool_uses(&self) -> Vec<&ContentPart> {
        match &self.content {
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ToolUse { .. }))
                .collect(),
            MessageContent::Text(_) => Vec::new(),
        }
    }
}

/// Builder for conversation messages.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    role: MessageRole,
    content: MessageContent,
}

impl MessageBuilder {
    fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Append a content block, promoting plain text to block content.
    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.content = match self.content {
            MessageContent::Text(text) if text.is_empty() => MessageContent::Parts(vec![part]),
            MessageContent::Text(text) => {
                MessageContent::Parts(vec![ContentPart::Text { text }, part])
            }
            MessageContent::Parts(mut parts) => {
                parts.push(part);
                MessageContent::Parts(parts)
            }
        };
        self
    }

    /// Append an image block.
    pub fn with_image(self, source: MediaSource) -> Self {
        self.with_part(ContentPart::Image { source })
    }

    pub fn build(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
        }
    }
}
