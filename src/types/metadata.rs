//! Request/response metadata and the provenance trail

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the pipeline touched the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceStage {
    Frontend,
    Backend,
    Router,
}

/// One hop in the provenance trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub stage: ProvenanceStage,
    /// Adapter or backend name.
    pub name: String,
    pub at: DateTime<Utc>,
}

/// Append-only record of which adapters/backends touched a request.
///
/// Entries are never removed, only appended; the trail is what makes
/// multi-hop translation chains debuggable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    entries: Vec<ProvenanceEntry>,
}

impl Provenance {
    pub fn push_frontend(&mut self, name: impl Into<String>) {
        self.push(ProvenanceStage::Frontend, name);
    }

    pub fn push_backend(&mut self, name: impl Into<String>) {
        self.push(ProvenanceStage::Backend, name);
    }

    pub fn push_router(&mut self, name: impl Into<String>) {
        self.push(ProvenanceStage::Router, name);
    }

    fn push(&mut self, stage: ProvenanceStage, name: impl Into<String>) {
        self.entries.push(ProvenanceEntry {
            stage,
            name: name.into(),
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    /// Last backend entry, if any.
    pub fn backend(&self) -> Option<&ProvenanceEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.stage == ProvenanceStage::Backend)
    }

    /// Last frontend entry, if any.
    pub fn frontend(&self) -> Option<&ProvenanceEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.stage == ProvenanceStage::Frontend)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Metadata carried by an IR request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Unique per logical request; propagated unchanged through every stage
    /// including retries.
    pub request_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provenance: Provenance,
    /// Free-form caller data, passed through untouched.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
}

/// Metadata carried by an IR response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Mirrors the request id of the originating request.
    pub request_id: Option<String>,
    #[serde(default)]
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_is_append_only_and_ordered() {
        let mut p = Provenance::default();
        p.push_frontend("openai-frontend");
        p.push_router("router");
        p.push_backend("anthropic");
        assert_eq!(p.entries().len(), 3);
        assert_eq!(p.frontend().unwrap().name, "openai-frontend");
        assert_eq!(p.backend().unwrap().name, "anthropic");
    }

    #[test]
    fn backend_returns_most_recent() {
        let mut p = Provenance::default();
        p.push_backend("first");
        p.push_backend("second");
        assert_eq!(p.backend().unwrap().name, "second");
    }
}
