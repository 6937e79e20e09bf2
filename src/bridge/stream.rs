//! Stream post-processing
//!
//! Wraps a backend chunk stream to enforce the IR stream protocol on the way
//! to the caller: monotonic sequence numbers, exactly one terminal chunk, the
//! requested presentation mode, and a synthesized error chunk when the
//! transport dies abruptly. The wrapper owns the inner stream, so dropping it
//! on any exit path releases the underlying transport.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;

use super::events::{BridgeEvent, EventBus};
use super::stats::BridgeStats;
use crate::types::{ChatStream, StreamChunk, StreamMode};

pub(crate) fn guard_stream(
    inner: ChatStream,
    mode: StreamMode,
    stats: Arc<BridgeStats>,
    events: Arc<EventBus>,
    request_id: String,
) -> ChatStream {
    let started = Instant::now();
    let s = async_stream::stream! {
        let mut inner = inner;
        let mut last_sequence: Option<u64> = None;
        let mut accumulated = String::new();
        let mut terminated = false;

        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(seq) = chunk.sequence() {
                        if last_sequence.is_some_and(|prev| seq < prev) {
                            let message = format!(
                                "out-of-order stream chunk: sequence {seq} after {}",
                                last_sequence.unwrap_or_default()
                            );
                            stats.record_failure("internal");
                            events.emit(&BridgeEvent::StreamError {
                                request_id: request_id.clone(),
                                message: message.clone(),
                            });
                            yield Ok(StreamChunk::Error { message });
                            terminated = true;
                            break;
                        }
                        last_sequence = Some(seq);
                    }

                    let chunk = match (mode, chunk) {
                        (StreamMode::Accumulated, StreamChunk::Content { delta, sequence }) => {
                            accumulated.push_str(&delta);
                            StreamChunk::Content {
                                delta: accumulated.clone(),
                                sequence,
                            }
                        }
                        (_, chunk) => chunk,
                    };

                    let terminal = chunk.is_terminal();
                    if terminal {
                        match &chunk {
                            StreamChunk::Done { .. } => {
                                stats.record_success(started.elapsed());
                                events.emit(&BridgeEvent::StreamComplete {
                                    request_id: request_id.clone(),
                                });
                            }
                            StreamChunk::Error { message } => {
                                stats.record_failure("provider");
                                events.emit(&BridgeEvent::StreamError {
                                    request_id: request_id.clone(),
                                    message: message.clone(),
                                });
                            }
                            _ => {}
                        }
                    }

                    yield Ok(chunk);
                    if terminal {
                        terminated = true;
                        break;
                    }
                }
                Err(e) => {
                    // Abrupt transport failure: surface exactly one terminal
                    // error chunk instead of a bare stream error.
                    let message = e.to_string();
                    stats.record_failure(e.code());
                    events.emit(&BridgeEvent::StreamError {
                        request_id: request_id.clone(),
                        message: message.clone(),
                    });
                    yield Ok(StreamChunk::Error { message });
                    terminated = true;
                    break;
                }
            }
        }

        if !terminated {
            let message = "stream ended without a terminal chunk".to_string();
            tracing::warn!(request_id = %request_id, "synthesizing stream error: {message}");
            stats.record_failure("network");
            events.emit(&BridgeEvent::StreamError {
                request_id: request_id.clone(),
                message: message.clone(),
            });
            yield Ok(StreamChunk::Error { message });
        }
    };
    Box::pin(s)
}
