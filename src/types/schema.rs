//! Schema directive types for structured output

use serde::{Deserialize, Serialize};

/// How the schema is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    /// Standard JSON Schema document.
    #[default]
    JsonSchema,
}

/// Mechanism used to obtain schema-shaped output from a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Inject a tool whose parameters are the schema and force the model to
    /// call it.
    Tools,
    /// Ask the provider for JSON output and parse the assistant text.
    Json,
    /// Provider-native JSON-schema response format.
    JsonSchema,
    /// Instruct the model to answer with a fenced ```json block.
    MdJson,
}

/// Schema directive attached to an IR request.
///
/// Mode selection is the caller's responsibility; the structured output
/// engine validates the schema shape before any network call is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDirective {
    #[serde(default)]
    pub schema_type: SchemaType,
    pub schema: serde_json::Value,
    pub mode: ExtractionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When false, validation failures become response-metadata warnings
    /// instead of errors.
    #[serde(default = "default_validate")]
    pub validate: bool,
}

fn default_validate() -> bool {
    true
}

impl SchemaDirective {
    pub fn new(schema: serde_json::Value, mode: ExtractionMode) -> Self {
        Self {
            schema_type: SchemaType::JsonSchema,
            schema,
            mode,
            name: None,
            description: None,
            validate: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub const fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}
