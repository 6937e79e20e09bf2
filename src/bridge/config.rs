//! Bridge configuration

use std::collections::HashMap;
use std::time::Duration;

/// Configuration accepted by the bridge constructor. All fields have
/// documented defaults.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Emit debug-level traces for every pipeline stage.
    pub debug: bool,
    /// Per-attempt deadline for backend calls. Default 30 s.
    pub timeout: Duration,
    /// Retries after the initial attempt (non-streaming path only).
    /// Default 0.
    pub retries: u32,
    /// Generate a request id when the caller didn't supply one. Default true.
    pub auto_request_id: bool,
    /// Model merged into requests that don't specify one.
    pub default_model: Option<String>,
    /// Free-form extension data for middleware and adapters.
    pub custom: HashMap<String, serde_json::Value>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            timeout: Duration::from_millis(30_000),
            retries: 0,
            auto_request_id: true,
            default_model: None,
            custom: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub const fn with_auto_request_id(mut self, auto: bool) -> Self {
        self.auto_request_id = auto;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.retries, 0);
        assert!(config.auto_request_id);
        assert!(config.default_model.is_none());
    }
}
