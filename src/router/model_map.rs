//! Model-name translation
//!
//! Translation lives in the router, not in backend adapters, because only
//! the router knows which provider a request is ultimately bound for.

use std::collections::HashMap;

use regex::Regex;

use crate::error::GatewayError;

/// How a requested model id maps onto a backend's model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationStrategy {
    /// Forward the requested name untouched.
    #[default]
    None,
    /// Look the requested model up in the mapping table.
    Exact,
    /// Try the pattern rules in order.
    Pattern,
    /// Exact, else pattern, else the backend's configured default (with a
    /// warning when the default is used).
    Hybrid,
}

/// One regex rewrite rule. The replacement may use capture groups
/// (`$1`, `$name`).
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: Regex,
    pub replacement: String,
}

/// Model-name translator configured per router.
#[derive(Debug, Clone, Default)]
pub struct ModelTranslator {
    strategy: TranslationStrategy,
    table: HashMap<String, String>,
    patterns: Vec<PatternRule>,
    /// Turn "no mapping found" into a hard failure instead of silently
    /// forwarding the original name.
    strict: bool,
}

impl ModelTranslator {
    pub fn new(strategy: TranslationStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Passthrough translator.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.table.insert(from.into(), to.into());
        self
    }

    pub fn with_table(mut self, table: HashMap<String, String>) -> Self {
        self.table.extend(table);
        self
    }

    /// Add a pattern rule. Fails on an invalid regex.
    pub fn with_pattern(
        mut self,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| GatewayError::validation(format!("invalid model pattern: {e}")))?;
        self.patterns.push(PatternRule {
            pattern,
            replacement: replacement.into(),
        });
        Ok(self)
    }

    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Translate `model` for the named backend.
    ///
    /// `backend_default` is the backend's configured fallback model, used
    /// only by the hybrid strategy.
    pub fn translate(
        &self,
        model: &str,
        backend: &str,
        backend_default: Option<&str>,
    ) -> Result<String, GatewayError> {
        match self.strategy {
            TranslationStrategy::None => Ok(model.to_string()),
            TranslationStrategy::Exact => match self.lookup_exact(model) {
                Some(mapped) => Ok(mapped),
                None => self.unmapped(model, backend),
            },
            TranslationStrategy::Pattern => match self.lookup_pattern(model) {
                Some(mapped) => Ok(mapped),
                None => self.unmapped(model, backend),
            },
            TranslationStrategy::Hybrid => {
                if let Some(mapped) = self.lookup_exact(model) {
                    return Ok(mapped);
                }
                if let Some(mapped) = self.lookup_pattern(model) {
                    return Ok(mapped);
                }
                if let Some(default) = backend_default {
                    tracing::warn!(
                        model,
                        backend,
                        default,
                        "no model mapping found; using backend default"
                    );
                    return Ok(default.to_string());
                }
                self.unmapped(model, backend)
            }
        }
    }

    fn lookup_exact(&self, model: &str) -> Option<String> {
        self.table.get(model).cloned()
    }

    fn lookup_pattern(&self, model: &str) -> Option<String> {
        self.patterns.iter().find_map(|rule| {
            rule.pattern.is_match(model).then(|| {
                rule.pattern
                    .replace(model, rule.replacement.as_str())
                    .into_owned()
            })
        })
    }

    fn unmapped(&self, model: &str, backend: &str) -> Result<String, GatewayError> {
        if self.strict {
            Err(GatewayError::validation(format!(
                "no model mapping for '{model}' on backend '{backend}'"
            )))
        } else {
            Ok(model.to_string())
        }
    }
}
