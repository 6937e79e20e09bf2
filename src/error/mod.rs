//! Error Handling Module
//!
//! One crate-wide error type covers every stage of the pipeline. Each variant
//! maps to an error kind the gateway reasons about: whether it may be retried,
//! which broad category it belongs to, and the stable code string recorded in
//! the bridge's error histogram.
//!
//! Retry decisions are made solely from [`GatewayError::is_retryable`] and the
//! remaining attempt budget; no stage applies cross-kind heuristics.

use std::time::Duration;

use thiserror::Error;

/// Broad error category, useful for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller sent something the gateway cannot process.
    Client,
    /// The backend provider reported a failure.
    Server,
    /// The transport between gateway and provider failed.
    Transport,
    /// The gateway itself misbehaved.
    Internal,
}

/// Gateway error taxonomy.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Malformed request or schema. Never retryable, never sent to a backend.
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication or authorization failure. Never retryable.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Provider rate limit. Retryable; carries the retry-after hint when known.
    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        /// Provider-supplied hint for when to retry.
        retry_after: Option<Duration>,
    },

    /// Network-level failure between gateway and provider. Always retryable.
    #[error("network error: {0}")]
    Network(String),

    /// A configured timeout elapsed while a call was in flight. Retryable.
    #[error("timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Backend-reported failure. Retryable only for 5xx-class conditions.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP-style status code reported by the provider.
        status: u16,
        message: String,
        /// Raw provider payload, when available.
        details: Option<serde_json::Value>,
    },

    /// An adapter failed to translate between a client/provider format and
    /// the IR. Never retryable: it indicates a frontend/backend/IR mismatch.
    #[error("conversion error in {adapter}: {message}")]
    Conversion { adapter: String, message: String },

    /// A failure raised inside the middleware chain that is not already a
    /// typed gateway error.
    #[error("middleware error: {message}")]
    Middleware {
        message: String,
        /// Request id of the offending request, when known.
        request_id: Option<String>,
    },

    /// Aggregate failure from the router naming every backend attempted.
    #[error("all backends failed: {message}")]
    Router {
        message: String,
        /// Backends that were actually tried.
        attempted: Vec<String>,
        /// Backends skipped because their circuit was open.
        skipped: Vec<String>,
    },

    /// The caller abandoned the request. Not a reportable failure.
    #[error("request cancelled")]
    Cancelled,

    /// Anything the gateway cannot classify. Never retryable, since the
    /// safety of retrying an unknown failure mode cannot be assumed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a conversion failure in a named adapter.
    pub fn conversion(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a provider-reported failure.
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Shorthand for an unclassified internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a fresh attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Network(_) | Self::Timeout { .. } => true,
            Self::Provider { status, .. } => *status >= 500,
            // Retryable only if some candidate was never genuinely tried.
            Self::Router { skipped, .. } => !skipped.is_empty(),
            Self::Validation(_)
            | Self::Auth(_)
            | Self::Conversion { .. }
            | Self::Middleware { .. }
            | Self::Cancelled
            | Self::Internal(_) => false,
        }
    }

    /// Broad category for logging and metrics.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Auth(_) | Self::Conversion { .. } => ErrorCategory::Client,
            Self::Provider { .. } | Self::RateLimit { .. } | Self::Router { .. } => {
                ErrorCategory::Server
            }
            Self::Network(_) | Self::Timeout { .. } | Self::Cancelled => ErrorCategory::Transport,
            Self::Middleware { .. } | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Stable code string used as the key of the error histogram.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::RateLimit { .. } => "rate_limit",
            Self::Network(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::Provider { .. } => "provider",
            Self::Conversion { .. } => "conversion",
            Self::Middleware { .. } => "middleware",
            Self::Router { .. } => "router",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}
