#![allow(clippy::large_enum_variant)]
//! Streaming chunk types for real-time responses

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::metadata::ResponseMetadata;
use super::response::{FinishReason, Usage};
use crate::error::GatewayError;

/// Presentation mode for content chunks, chosen once per request and held
/// constant for its duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Each content chunk carries only newly produced text.
    #[default]
    Delta,
    /// Each content chunk carries the full text so far.
    Accumulated,
}

/// One chunk of a streamed response.
///
/// Chunks for a single response are strictly ordered by `sequence`, and a
/// stream terminates in exactly one of `Done` or `Error` - never both, never
/// neither. On abrupt transport failure the bridge synthesizes an `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Stream opened.
    Start,
    /// Incremental (or accumulated, per [`StreamMode`]) text content.
    Content { delta: String, sequence: u64 },
    /// Incremental tool-call arguments, keyed by tool-call id.
    ToolUse {
        id: String,
        /// Tool name, present on the first chunk of a call.
        name: Option<String>,
        input_delta: Option<String>,
        sequence: u64,
    },
    /// Mid-stream metadata update.
    Metadata { metadata: ResponseMetadata },
    /// Terminal failure.
    Error { message: String },
    /// Terminal success.
    Done {
        /// The fully assembled assistant message, when the backend provides it.
        message: Option<Message>,
        finish_reason: Option<FinishReason>,
        usage: Option<Usage>,
    },
}

impl StreamChunk {
    /// Sequence number carried by ordered chunk kinds.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Self::Content { sequence, .. } | Self::ToolUse { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }

    /// Whether this chunk terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// A lazy, finite sequence of stream chunks. Not restartable: a fresh call
/// re-executes the whole pipeline.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_only_on_ordered_kinds() {
        assert_eq!(
            StreamChunk::Content {
                delta: "hi".into(),
                sequence: 3
            }
            .sequence(),
            Some(3)
        );
        assert_eq!(StreamChunk::Start.sequence(), None);
    }

    #[test]
    fn terminal_detection() {
        assert!(
            StreamChunk::Done {
                message: None,
                finish_reason: None,
                usage: None
            }
            .is_terminal()
        );
        assert!(
            StreamChunk::Error {
                message: "boom".into()
            }
            .is_terminal()
        );
        assert!(!StreamChunk::Start.is_terminal());
    }

    // ChatStream must be usable across tasks.
    #[test]
    fn chat_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ChatStream>();
    }
}
