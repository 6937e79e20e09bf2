//! Bridge statistics
//!
//! Counters and latency samples shared by all in-flight requests; everything
//! concurrent goes through atomics or a mutex. Percentiles are computed by
//! sorted-sample indexing over the raw samples, not a decaying histogram.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time view of the bridge's counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub streaming_requests: u64,
    pub latency_p50_ms: Option<u64>,
    pub latency_p95_ms: Option<u64>,
    pub latency_p99_ms: Option<u64>,
    /// Error counts keyed by [`crate::error::GatewayError::code`].
    pub error_codes: HashMap<String, u64>,
}

/// Shared request statistics.
#[derive(Debug, Default)]
pub struct BridgeStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    streaming_requests: AtomicU64,
    latencies_ms: Mutex<Vec<u64>>,
    error_codes: Mutex<HashMap<String, u64>>,
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_start(&self) {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_stream_start(&self) {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        self.streaming_requests.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_success(&self, latency: Duration) {
        self.successful_requests.fetch_add(1, Ordering::SeqCst);
        // Plain counters: a poisoned lock leaves the data usable, so recover
        // the guard rather than panic.
        self.latencies_ms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(latency.as_millis() as u64);
    }

    pub fn record_failure(&self, code: &str) {
        self.failed_requests.fetch_add(1, Ordering::SeqCst);
        *self
            .error_codes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(code.to_string())
            .or_insert(0) += 1;
    }

    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::SeqCst)
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mut samples = self
            .latencies_ms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        samples.sort_unstable();
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::SeqCst),
            successful_requests: self.successful_requests.load(Ordering::SeqCst),
            failed_requests: self.failed_requests.load(Ordering::SeqCst),
            streaming_requests: self.streaming_requests.load(Ordering::SeqCst),
            latency_p50_ms: percentile(&samples, 0.50),
            latency_p95_ms: percentile(&samples, 0.95),
            latency_p99_ms: percentile(&samples, 0.99),
            error_codes: self
                .error_codes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[u64], q: f64) -> Option<u64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}
