//! # Manifest Validation Capability
//!
//! Packagers never import a schema engine. They receive a
//! [`ManifestValidator`] and refuse to write anything when it reports
//! errors. Closures implement the trait, which is how tests inject
//! deterministic accept/reject behaviour.

use serde_json::Value;

/// Protocol versions a manifest may declare.
pub const SUPPORTED_ADP_VERSIONS: &[&str] = &["0.1.0", "0.2.0"];

/// Checks an ADP document and reports every problem found.
///
/// An empty result means the document is valid. Implementations must
/// return the complete list rather than stopping at the first error.
pub trait ManifestValidator {
    /// Validate a parsed ADP document.
    fn validate(&self, document: &Value) -> Vec<String>;
}

impl<F> ManifestValidator for F
where
    F: Fn(&Value) -> Vec<String>,
{
    fn validate(&self, document: &Value) -> Vec<String> {
        self(document)
    }
}

/// Schema-free structural checks.
///
/// Covers the rules every ADP consumer depends on: a supported
/// `adp_version`, a non-empty `id`, at least one `runtime.execution`
/// entry, and object-typed `flow` and `evaluation` sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl ManifestValidator for StructuralValidator {
    fn validate(&self, document: &Value) -> Vec<String> {
        let Some(root) = document.as_object() else {
            return vec!["manifest must be a mapping".to_string()];
        };
        let mut errors = Vec::new();

        match root.get("adp_version").and_then(Value::as_str) {
            Some(v) if SUPPORTED_ADP_VERSIONS.contains(&v) => {}
            Some(v) => errors.push(format!("adp_version must be 0.1.0 or 0.2.0, got {v}")),
            None => errors.push("adp_version is required".to_string()),
        }

        match root.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => {}
            Some(_) => errors.push("id must not be empty".to_string()),
            None => errors.push("id is required".to_string()),
        }

        match root.get("runtime").and_then(|r| r.get("execution")) {
            Some(Value::Array(entries)) if !entries.is_empty() => {
                for (i, entry) in entries.iter().enumerate() {
                    for field in ["backend", "id"] {
                        if entry.get(field).and_then(Value::as_str).is_none() {
                            errors.push(format!("runtime.execution[{i}].{field} is required"));
                        }
                    }
                }
            }
            Some(Value::Array(_)) => errors.push("runtime.execution must not be empty".to_string()),
            Some(_) => errors.push("runtime.execution must be a list".to_string()),
            None => errors.push("runtime.execution is required".to_string()),
        }

        for section in ["flow", "evaluation"] {
            match root.get(section) {
                Some(Value::Object(_)) => {}
                Some(_) => errors.push(format!("{section} must be a mapping")),
                None => errors.push(format!("{section} is required")),
            }
        }

        errors
    }
}
