//! Chat response types

use serde::{Deserialize, Serialize};

use super::message::{Message, MessageContent, MessageRole};
use super::metadata::ResponseMetadata;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
}

/// Token usage. Optional end to end - not all providers report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// IR chat response: one assistant message plus delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl ChatResponse {
    /// Create a response from assistant content.
    pub fn new(content: MessageContent) -> Self {
        Self {
            message: Message {
                role: MessageRole::Assistant,
                content,
            },
            finish_reason: None,
            usage: None,
            metadata: ResponseMetadata::default(),
        }
    }

    pub const fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub const fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Convenience accessor for the first text block.
    pub fn content_text(&self) -> Option<&str> {
        self.message.content.text()
    }

    /// Tool-use blocks in the assistant message, in order.
    pub fn tool_uses(&self) -> Vec<&super::message::ContentPart> {
        self.message.tool_uses()
    }
}
