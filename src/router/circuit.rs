//! Per-backend circuit breaker
//!
//! Tracks failures reported for one backend and temporarily removes it from
//! rotation once a threshold is exceeded. States: closed → open → half-open
//! → {closed, open}. Counters are atomics: multiple in-flight requests may
//! report failures concurrently.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Circuit breaker configuration. Required constructor parameters of the
/// router, with conservative defaults rather than hard-coded constants.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit blocks before moving to half-open.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Failure-tracking state machine for one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// 0 = closed, 1 = open, 2 = half-open.
    state: AtomicU8,
    failure_count: AtomicU32,
    /// Unix timestamp (ms) when the circuit opened.
    opened_at_ms: AtomicU64,
    /// Trial calls admitted while half-open; exactly one is allowed.
    half_open_trials: AtomicU32,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            half_open_trials: AtomicU32::new(0),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Whether a call may be routed through this breaker right now.
    ///
    /// An open circuit whose cool-down has elapsed transitions to half-open
    /// and admits exactly one trial call.
    pub fn can_execute(&self) -> bool {
        match self.state.load(Ordering::SeqCst) {
            STATE_CLOSED => true,
            STATE_OPEN => {
                let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
                if now_ms().saturating_sub(opened_at) >= self.config.open_duration.as_millis() as u64
                {
                    // Claim the single trial before exposing the half-open
                    // state: a racing caller that observes half-open must
                    // already find the trial taken.
                    if self.try_admit_half_open() {
                        let _ = self.state.compare_exchange(
                            STATE_OPEN,
                            STATE_HALF_OPEN,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                        return true;
                    }
                }
                false
            }
            STATE_HALF_OPEN => self.try_admit_half_open(),
            _ => true,
        }
    }

    fn try_admit_half_open(&self) -> bool {
        // One trial call per half-open window.
        self.half_open_trials
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Report a successful call. Closes the breaker and resets the count.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        self.half_open_trials.store(0, Ordering::SeqCst);
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    /// Report a failed call. Opens the breaker once the threshold is hit; a
    /// half-open failure re-opens immediately and restarts the window.
    pub fn record_failure(&self) {
        let state = self.state.load(Ordering::SeqCst);
        if state == STATE_HALF_OPEN {
            self.open();
            return;
        }
        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.config.failure_threshold {
            self.open();
        }
    }

    fn open(&self) {
        self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
        self.half_open_trials.store(0, Ordering::SeqCst);
        self.state.store(STATE_OPEN, Ordering::SeqCst);
    }

    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, open_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            open_duration: Duration::from_millis(open_ms),
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker(3, 60_000);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn success_resets_the_count() {
        let cb = breaker(2, 60_000);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_exactly_one_trial() {
        let cb = breaker(1, 0);
        cb.record_failure();
        // Cool-down of zero: the next check transitions to half-open.
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // Second caller in the same window is rejected.
        assert!(!cb.can_execute());
    }

    #[test]
    fn concurrent_callers_get_a_single_half_open_trial() {
        use std::sync::Arc;

        let cb = Arc::new(breaker(1, 0));
        cb.record_failure();

        // Every thread races can_execute at the end of the cool-down; the
        // breaker must admit exactly one of them.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = Arc::clone(&cb);
                std::thread::spawn(move || cb.can_execute())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_closes() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(cb.can_execute());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.can_execute());
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = breaker(1, 60_000);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        // Force the trial by using a zero-window breaker instead.
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(cb.can_execute());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
