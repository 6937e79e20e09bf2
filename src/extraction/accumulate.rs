//! Streaming tool-call accumulation
//!
//! Providers stream tool-call arguments as raw string fragments spread
//! across chunks, with several calls interleaved by id. The accumulator
//! keeps one buffer per call id in first-seen order, exposes a best-effort
//! snapshot of each buffer at any point mid-stream, and releases all
//! buffers when the stream finishes.

use std::collections::HashMap;

use serde_json::Value;

use super::partial_json::parse_partial;

/// A fully accumulated tool call, produced when the stream terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    /// Best-effort parse of the accumulated argument text.
    pub arguments: Value,
}

#[derive(Default)]
struct CallBuffer {
    name: Option<String>,
    arguments: String,
}

/// Accumulates interleaved tool-call argument fragments by call id.
#[derive(Default)]
pub struct ToolCallAccumulator {
    buffers: HashMap<String, CallBuffer>,
    /// First-seen order of call ids, preserved in the final output.
    order: Vec<String>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fragment for the given call id.
    pub fn push(&mut self, id: &str, name: Option<&str>, input_delta: Option<&str>) {
        let buffer = self.buffers.entry(id.to_string()).or_insert_with(|| {
            self.order.push(id.to_string());
            CallBuffer::default()
        });
        if let Some(name) = name {
            buffer.name = Some(name.to_string());
        }
        if let Some(delta) = input_delta {
            buffer.arguments.push_str(delta);
        }
    }

    /// Best-effort view of one call's arguments as accumulated so far.
    pub fn snapshot(&self, id: &str) -> Option<Value> {
        self.buffers
            .get(id)
            .map(|b| parse_partial(&b.arguments))
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Drain all buffers in first-seen order. The accumulator is empty
    /// afterwards; fragment memory is not retained past the stream.
    pub fn finish(&mut self) -> Vec<CompletedToolCall> {
        let mut completed = Vec::with_capacity(self.order.len());
        for id in self.order.drain(..) {
            if let Some(buffer) = self.buffers.remove(&id) {
                completed.push(CompletedToolCall {
                    name: buffer.name.unwrap_or_else(|| id.clone()),
                    arguments: parse_partial(&buffer.arguments),
                    id,
                });
            }
        }
        completed
    }
}
