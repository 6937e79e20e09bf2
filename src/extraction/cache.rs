//! Compiled schema cache
//!
//! Schema compilation and the tool-shaped conversion of a schema are pure
//! functions of the schema document, so they are computed once per
//! [`ExtractionSchema`] and reused. Entries are keyed by an opaque
//! process-unique [`SchemaId`] handle, never by hashing the document, and
//! stay cached until explicitly invalidated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::GatewayError;
use crate::types::Tool;

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying one schema registration.
///
/// Two registrations of textually identical schema documents get distinct
/// ids; equality of ids means "the same registration", nothing weaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(u64);

impl SchemaId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A JSON Schema registered for structured extraction.
#[derive(Clone)]
pub struct ExtractionSchema {
    id: SchemaId,
    name: String,
    description: Option<String>,
    schema: Value,
}

impl ExtractionSchema {
    /// Register a schema document. Fails fast if the document is not an
    /// object or does not compile as a JSON Schema.
    pub fn new(schema: Value) -> Result<Self, GatewayError> {
        if !schema.is_object() {
            return Err(GatewayError::validation(
                "extraction schema must be a JSON object",
            ));
        }
        jsonschema::validator_for(&schema)
            .map_err(|e| GatewayError::validation(format!("invalid JSON Schema: {e}")))?;
        Ok(Self {
            id: SchemaId::next(),
            name: "extract".to_string(),
            description: None,
            schema,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

impl std::fmt::Debug for ExtractionSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionSchema")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Everything derived from one schema registration.
pub(crate) struct CachedSchema {
    pub(crate) validator: jsonschema::Validator,
    pub(crate) tool: Tool,
}

impl CachedSchema {
    fn compile(schema: &ExtractionSchema) -> Result<Self, GatewayError> {
        let validator = jsonschema::validator_for(schema.schema())
            .map_err(|e| GatewayError::validation(format!("invalid JSON Schema: {e}")))?;
        let tool = Tool::new(schema.name(), schema.schema().clone()).with_description(
            schema
                .description()
                .unwrap_or("Return the structured result matching the given schema."),
        );
        Ok(Self { validator, tool })
    }

    /// First few validation failures, joined for the error message.
    pub(crate) fn validation_errors(&self, instance: &Value) -> Option<String> {
        if self.validator.validate(instance).is_ok() {
            return None;
        }
        let mut msgs = Vec::new();
        for err in self.validator.iter_errors(instance) {
            msgs.push(format!("{} at {}", err, err.instance_path));
            if msgs.len() >= 3 {
                break;
            }
        }
        Some(msgs.join("; "))
    }
}

/// Cache of compiled validators and tool conversions, keyed by [`SchemaId`].
#[derive(Default)]
pub(crate) struct SchemaCache {
    entries: RwLock<HashMap<SchemaId, Arc<CachedSchema>>>,
}

impl SchemaCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get_or_compile(
        &self,
        schema: &ExtractionSchema,
    ) -> Result<Arc<CachedSchema>, GatewayError> {
        if let Ok(entries) = self.entries.read()
            && let Some(entry) = entries.get(&schema.id())
        {
            return Ok(entry.clone());
        }
        let compiled = Arc::new(CachedSchema::compile(schema)?);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GatewayError::internal("schema cache lock poisoned"))?;
        // A racing writer may have compiled the same schema; keep one entry.
        Ok(entries
            .entry(schema.id())
            .or_insert(compiled)
            .clone())
    }

    /// Drop the cached entry for one registration.
    pub(crate) fn invalidate(&self, id: SchemaId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&id);
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}
