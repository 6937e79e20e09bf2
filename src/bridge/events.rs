//! Bridge lifecycle events
//!
//! Listener registry keyed by event kind plus a wildcard key. Emission
//! isolates each callback so one broken listener cannot abort delivery to
//! the rest or break the pipeline.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lifecycle event emitted by the bridge.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    RequestStart {
        request_id: String,
    },
    RequestSuccess {
        request_id: String,
        latency: Duration,
    },
    RequestError {
        request_id: String,
        code: &'static str,
    },
    StreamStart {
        request_id: String,
    },
    StreamComplete {
        request_id: String,
    },
    StreamError {
        request_id: String,
        message: String,
    },
}

impl BridgeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RequestStart { .. } => EventKind::RequestStart,
            Self::RequestSuccess { .. } => EventKind::RequestSuccess,
            Self::RequestError { .. } => EventKind::RequestError,
            Self::StreamStart { .. } => EventKind::StreamStart,
            Self::StreamComplete { .. } => EventKind::StreamComplete,
            Self::StreamError { .. } => EventKind::StreamError,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            Self::RequestStart { request_id }
            | Self::RequestSuccess { request_id, .. }
            | Self::RequestError { request_id, .. }
            | Self::StreamStart { request_id }
            | Self::StreamComplete { request_id }
            | Self::StreamError { request_id, .. } => request_id,
        }
    }
}

/// Subscription key: a specific event kind or the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestStart,
    RequestSuccess,
    RequestError,
    StreamStart,
    StreamComplete,
    StreamError,
    /// Receives every event.
    Any,
}

/// Callback handle registered with the bus.
pub type EventListener = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Listener registry with wildcard subscription.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind.
    pub fn subscribe(&self, kind: EventKind, listener: EventListener) {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(kind)
            .or_default()
            .push(listener);
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&self, listener: EventListener) {
        self.subscribe(EventKind::Any, listener);
    }

    /// Deliver an event to the kind-specific listeners and the wildcard set.
    ///
    /// A panicking listener is caught and logged; delivery continues.
    pub fn emit(&self, event: &BridgeEvent) {
        let targets: Vec<EventListener> = {
            // The registry stays consistent even if a subscriber panicked
            // while holding the lock; recover the guard rather than panic.
            let map = self
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut targets = Vec::new();
            if let Some(specific) = map.get(&event.kind()) {
                targets.extend(specific.iter().cloned());
            }
            if let Some(wildcard) = map.get(&EventKind::Any) {
                targets.extend(wildcard.iter().cloned());
            }
            targets
        };

        for listener in targets {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(
                    request_id = event.request_id(),
                    kind = ?event.kind(),
                    "event listener panicked; continuing delivery"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn start_event() -> BridgeEvent {
        BridgeEvent::RequestStart {
            request_id: "req-1".into(),
        }
    }

    #[test]
    fn specific_and_wildcard_listeners_both_fire() {
        let bus = EventBus::new();
        let specific = Arc::new(AtomicU32::new(0));
        let wildcard = Arc::new(AtomicU32::new(0));

        let s = specific.clone();
        bus.subscribe(
            EventKind::RequestStart,
            Arc::new(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let w = wildcard.clone();
        bus.subscribe_all(Arc::new(move |_| {
            w.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(&start_event());
        bus.emit(&BridgeEvent::StreamComplete {
            request_id: "req-2".into(),
        });

        assert_eq!(specific.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_block_the_rest() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicU32::new(0));

        bus.subscribe(
            EventKind::RequestStart,
            Arc::new(|_| panic!("broken listener")),
        );
        let d = delivered.clone();
        bus.subscribe(
            EventKind::RequestStart,
            Arc::new(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(&start_event());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_kinds_are_silent() {
        let bus = EventBus::new();
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        bus.subscribe(
            EventKind::StreamError,
            Arc::new(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.emit(&start_event());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
