//! Backend capability declarations

use serde::{Deserialize, Serialize};

/// Capability set declared by a backend adapter.
///
/// The router's capability-based strategy matches these against what a
/// request needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    pub streaming: bool,
    pub tools: bool,
    pub multi_modal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<u32>,
}

impl BackendCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub const fn with_tools(mut self) -> Self {
        self.tools = true;
        self
    }

    pub const fn with_multi_modal(mut self) -> Self {
        self.multi_modal = true;
        self
    }

    pub const fn with_max_context_tokens(mut self, tokens: u32) -> Self {
        self.max_context_tokens = Some(tokens);
        self
    }
}

/// Identifying metadata for an adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterMetadata {
    /// Canonical adapter name, recorded in provenance.
    pub name: String,
    #[serde(default)]
    pub capabilities: BackendCapabilities,
}

impl AdapterMetadata {
    pub fn new(name: impl Into<String>, capabilities: BackendCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_builder() {
        let caps = BackendCapabilities::new()
            .with_streaming()
            .with_tools()
            .with_max_context_tokens(200_000);
        assert!(caps.streaming);
        assert!(caps.tools);
        assert!(!caps.multi_modal);
        assert_eq!(caps.max_context_tokens, Some(200_000));
    }
}
