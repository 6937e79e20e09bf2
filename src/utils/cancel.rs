//! Cancellation utilities
//!
//! A cancellation handle travels alongside every request and stream call.
//! Honoring it mid-transport is a backend adapter responsibility; the bridge
//! uses it to stop issuing retries and to cut off in-flight streams.

use tokio_util::sync::CancellationToken;

use crate::types::ChatStream;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new, uncancelled handle.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Any wrapped streams/futures observing this
    /// handle stop as soon as possible; dropping a cancelled stream releases
    /// the underlying transport so providers stop generating tokens.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Wrap a stream so it ends as soon as the handle is cancelled.
///
/// The wrapper owns the inner stream, so every exit path - completion, early
/// termination, cancellation - drops it and releases the transport.
pub fn cancellable_stream(stream: ChatStream, handle: CancelHandle) -> ChatStream {
    let token = handle.token.clone();
    let mut inner = stream;
    let s = async_stream::stream! {
        use futures::StreamExt;
        loop {
            tokio::select! {
                // Cancellation wins over a ready chunk.
                biased;
                _ = token.cancelled() => break,
                item = inner.next() => {
                    let Some(item) = item else { break };
                    yield item;
                }
            }
        }
    };
    Box::pin(s)
}
