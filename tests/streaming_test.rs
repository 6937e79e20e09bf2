//! Stream guarantees through the bridge: ordering, exactly-one-terminal,
//! accumulated mode, and failure synthesis.

mod support;

use futures_util::StreamExt;

use llmgate::error::GatewayError;
use llmgate::prelude::*;

use support::{FixtureBackend, ScriptedStreamBackend, user_request};

async fn collect(
    bridge: &Bridge<IdentityFrontend>,
    request: ChatRequest,
) -> Vec<Result<StreamChunk, GatewayError>> {
    let mut stream = bridge.chat_stream(request).await.unwrap();
    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item);
    }
    chunks
}

#[tokio::test]
async fn happy_path_stream_ends_with_done() {
    let backend = FixtureBackend::new("fixture", "hello");
    let bridge = Bridge::new(IdentityFrontend, backend);

    let chunks = collect(&bridge, user_request("hi")).await;
    let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();

    assert!(matches!(chunks.first(), Some(StreamChunk::Start)));
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
    let terminals = chunks.iter().filter(|c| c.is_terminal()).count();
    assert_eq!(terminals, 1);
}

#[tokio::test]
async fn stream_success_counts_once_in_stats() {
    let backend = FixtureBackend::new("fixture", "hello");
    let bridge = Bridge::new(IdentityFrontend, backend);

    let _ = collect(&bridge, user_request("hi")).await;
    assert_eq!(bridge.stats().successful_requests(), 1);
    assert_eq!(bridge.stats().failed_requests(), 0);
}

#[tokio::test]
async fn sequence_regression_becomes_terminal_error() {
    let backend = ScriptedStreamBackend::new(
        "broken",
        vec![
            StreamChunk::Start,
            StreamChunk::Content {
                delta: "a".into(),
                sequence: 1,
            },
            StreamChunk::Content {
                delta: "b".into(),
                sequence: 0,
            },
            StreamChunk::Content {
                delta: "never-delivered".into(),
                sequence: 2,
            },
        ],
    );
    let bridge = Bridge::new(IdentityFrontend, backend);

    let chunks = collect(&bridge, user_request("hi")).await;
    let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();

    // The out-of-order chunk is replaced by a terminal error and nothing
    // follows it.
    assert!(matches!(chunks.last(), Some(StreamChunk::Error { .. })));
    assert!(!chunks.iter().any(
        |c| matches!(c, StreamChunk::Content { delta, .. } if delta == "never-delivered")
    ));
    let terminals = chunks.iter().filter(|c| c.is_terminal()).count();
    assert_eq!(terminals, 1);
}

#[tokio::test]
async fn abrupt_end_synthesizes_error_terminal() {
    let backend = ScriptedStreamBackend::new(
        "truncated",
        vec![
            StreamChunk::Start,
            StreamChunk::Content {
                delta: "partial".into(),
                sequence: 0,
            },
            // No Done/Error chunk.
        ],
    );
    let bridge = Bridge::new(IdentityFrontend, backend);

    let chunks = collect(&bridge, user_request("hi")).await;
    let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();

    assert!(matches!(chunks.last(), Some(StreamChunk::Error { .. })));
    assert_eq!(bridge.stats().failed_requests(), 1);
}

#[tokio::test]
async fn accumulated_mode_rewrites_deltas_to_running_text() {
    let backend = ScriptedStreamBackend::new(
        "chatty",
        vec![
            StreamChunk::Start,
            StreamChunk::Content {
                delta: "Hel".into(),
                sequence: 0,
            },
            StreamChunk::Content {
                delta: "lo".into(),
                sequence: 1,
            },
            StreamChunk::Done {
                message: None,
                finish_reason: Some(FinishReason::Stop),
                usage: None,
            },
        ],
    );
    let bridge = Bridge::new(IdentityFrontend, backend);

    let request = ChatRequest::builder()
        .message(Message::user("hi").build())
        .stream_mode(StreamMode::Accumulated)
        .build();
    let chunks = collect(&bridge, request).await;
    let texts: Vec<String> = chunks
        .into_iter()
        .map(|c| c.unwrap())
        .filter_map(|c| match c {
            StreamChunk::Content { delta, .. } => Some(delta),
            _ => None,
        })
        .collect();

    assert_eq!(texts, vec!["Hel".to_string(), "Hello".to_string()]);
}

#[tokio::test]
async fn delta_mode_passes_deltas_through() {
    let backend = ScriptedStreamBackend::new(
        "chatty",
        vec![
            StreamChunk::Start,
            StreamChunk::Content {
                delta: "Hel".into(),
                sequence: 0,
            },
            StreamChunk::Content {
                delta: "lo".into(),
                sequence: 1,
            },
            StreamChunk::Done {
                message: None,
                finish_reason: Some(FinishReason::Stop),
                usage: None,
            },
        ],
    );
    let bridge = Bridge::new(IdentityFrontend, backend);

    let chunks = collect(&bridge, user_request("hi")).await;
    let texts: Vec<String> = chunks
        .into_iter()
        .map(|c| c.unwrap())
        .filter_map(|c| match c {
            StreamChunk::Content { delta, .. } => Some(delta),
            _ => None,
        })
        .collect();

    assert_eq!(texts, vec!["Hel".to_string(), "lo".to_string()]);
}

#[tokio::test]
async fn provider_error_chunk_counts_as_failure() {
    let backend = ScriptedStreamBackend::new(
        "failing",
        vec![
            StreamChunk::Start,
            StreamChunk::Error {
                message: "overloaded".into(),
            },
        ],
    );
    let bridge = Bridge::new(IdentityFrontend, backend);

    let chunks = collect(&bridge, user_request("hi")).await;
    let chunks: Vec<StreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
    assert!(
        matches!(chunks.last(), Some(StreamChunk::Error { message }) if message == "overloaded")
    );
    assert_eq!(bridge.stats().failed_requests(), 1);
    assert_eq!(bridge.stats().successful_requests(), 0);
}

#[tokio::test]
async fn cancelled_stream_stops_yielding() {
    let backend = FixtureBackend::new("fixture", "hello");
    let bridge = Bridge::new(IdentityFrontend, backend);

    let cancel = CancelHandle::new();
    cancel.cancel();
    let mut stream = bridge
        .chat_stream_with_cancel(user_request("hi"), cancel)
        .await
        .unwrap();

    // A pre-cancelled stream may only surface a synthesized terminal; no
    // content chunks are delivered.
    while let Some(item) = stream.next().await {
        if let Ok(chunk) = item {
            assert!(!matches!(chunk, StreamChunk::Content { .. }));
        }
    }
}
