//! # Runtime Schema Validation
//!
//! Validates JSON/YAML documents against JSON Schema (Draft 2020-12)
//! definitions. Every schema is registered under its `$id`; a schema file
//! without one is given `{SCHEMA_URI_PREFIX}{file name}`, so relative `$ref`s
//! between files in the same directory resolve the same way whichever
//! source the set came from.
//!
//! Validation collects every violation, each carrying the JSON Pointer of the
//! offending value and a human-readable message.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use adp_core::ManifestValidator;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Base URI for schema identifiers.
pub const SCHEMA_URI_PREFIX: &str = "https://schemas.agentdefinitionprotocol.org/adp/";

/// File name of the root ADP manifest schema.
pub const ADP_SCHEMA: &str = "adp.schema.json";

/// File name of the ACS container spec schema.
pub const ACS_SCHEMA: &str = "acs.schema.json";

const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    (ADP_SCHEMA, include_str!("../schemas/adp.schema.json")),
    ("runtime.schema.json", include_str!("../schemas/runtime.schema.json")),
    ("flow.schema.json", include_str!("../schemas/flow.schema.json")),
    ("evaluation.schema.json", include_str!("../schemas/evaluation.schema.json")),
    (ACS_SCHEMA, include_str!("../schemas/acs.schema.json")),
];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidationDetail {
    /// `$id` of the schema that was violated.
    pub schema_id: String,
    /// JSON Pointer to the offending value; empty for the document root.
    pub instance_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl std::fmt::Display for SchemaValidationDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.instance_path.is_empty() {
            "/"
        } else {
            &self.instance_path
        };
        write!(f, "{path}: {}", self.message)
    }
}

/// Errors returned by schema validation operations.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// A schema file could not be read or parsed.
    #[error("failed to load schema {path}: {reason}")]
    SchemaLoadError {
        /// Path or name of the schema.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// The document to validate could not be loaded.
    #[error("failed to load document {path}: {reason}")]
    DocumentLoadError {
        /// Path to the document.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// The schema could not be compiled into a validator.
    #[error("failed to compile schema {schema_id}: {reason}")]
    SchemaCompileError {
        /// The schema `$id`.
        schema_id: String,
        /// Compiler message.
        reason: String,
    },

    /// The document violates its schema.
    #[error("{} validation error(s) against {schema_id}", .details.len())]
    ValidationFailed {
        /// The schema that was violated.
        schema_id: String,
        /// Every violation found.
        details: Vec<SchemaValidationDetail>,
    },

    /// No schema is registered under the requested name or `$id`.
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    /// I/O error while scanning the schema directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaValidationError {
    /// Violation messages, or the error itself as a single message.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::ValidationFailed { details, .. } => {
                details.iter().map(ToString::to_string).collect()
            }
            other => vec![other.to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Schema retriever for $ref resolution
// ---------------------------------------------------------------------------

/// Resolves `$ref` URIs from the pre-loaded schema set.
struct LocalSchemaRetriever {
    schemas: HashMap<String, Value>,
}

impl jsonschema::Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        self.schemas
            .get(uri_str)
            .cloned()
            .ok_or_else(|| format!("schema not found for URI: {uri_str}").into())
    }
}

// ---------------------------------------------------------------------------
// SchemaValidator
// ---------------------------------------------------------------------------

/// A registry of schemas and the entry point for validating documents.
#[derive(Clone)]
pub struct SchemaValidator {
    /// Directory the schemas were loaded from; `None` for the embedded set.
    schema_dir: Option<PathBuf>,
    schema_map: HashMap<String, Value>,
    filename_to_id: HashMap<String, String>,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema_dir", &self.schema_dir)
            .field("schema_count", &self.schema_map.len())
            .finish()
    }
}

impl SchemaValidator {
    fn empty(schema_dir: Option<PathBuf>) -> Self {
        Self {
            schema_dir,
            schema_map: HashMap::new(),
            filename_to_id: HashMap::new(),
        }
    }

    /// Load every `*.schema.json` file directly under `schema_dir`.
    ///
    /// # Errors
    ///
    /// [`SchemaValidationError::SchemaLoadError`] if the directory does not
    /// exist or any schema file is unreadable or not a JSON object.
    pub fn new(schema_dir: impl Into<PathBuf>) -> Result<Self, SchemaValidationError> {
        let schema_dir = schema_dir.into();
        if !schema_dir.is_dir() {
            return Err(SchemaValidationError::SchemaLoadError {
                path: schema_dir.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&schema_dir)? {
            let path = entry?.path();
            let is_schema = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".schema.json"));
            if is_schema && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut validator = Self::empty(Some(schema_dir.clone()));
        for path in files {
            let load_err = |reason: String| SchemaValidationError::SchemaLoadError {
                path: path.display().to_string(),
                reason,
            };
            let content = std::fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
            let schema: Value = serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            validator.register(&filename, schema)?;
        }

        debug!(
            dir = %schema_dir.display(),
            count = validator.schema_count(),
            "loaded schemas"
        );
        Ok(validator)
    }

    /// The schema set compiled into this crate.
    pub fn builtin() -> Result<Self, SchemaValidationError> {
        let mut validator = Self::empty(None);
        for (filename, text) in BUILTIN_SCHEMAS {
            let schema: Value =
                serde_json::from_str(text).map_err(|e| SchemaValidationError::SchemaLoadError {
                    path: (*filename).to_string(),
                    reason: e.to_string(),
                })?;
            validator.register(filename, schema)?;
        }
        Ok(validator)
    }

    /// Register a schema under its `$id`, assigning one from `filename` when absent.
    fn register(&mut self, filename: &str, mut schema: Value) -> Result<(), SchemaValidationError> {
        let Some(obj) = schema.as_object_mut() else {
            return Err(SchemaValidationError::SchemaLoadError {
                path: filename.to_string(),
                reason: "schema must be a JSON object".to_string(),
            });
        };

        let schema_id = match obj.get("$id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = format!("{SCHEMA_URI_PREFIX}{filename}");
                obj.insert("$id".to_string(), Value::String(id.clone()));
                id
            }
        };

        self.filename_to_id
            .insert(filename.to_string(), schema_id.clone());
        self.schema_map.insert(schema_id, schema);
        Ok(())
    }

    /// Number of registered schemas.
    pub fn schema_count(&self) -> usize {
        self.schema_map.len()
    }

    /// Directory the schemas came from, or `None` for the embedded set.
    pub fn schema_dir(&self) -> Option<&Path> {
        self.schema_dir.as_deref()
    }

    /// Look up a schema by file name (e.g. `adp.schema.json`).
    pub fn get_schema_by_filename(&self, filename: &str) -> Option<&Value> {
        self.filename_to_id
            .get(filename)
            .and_then(|id| self.schema_map.get(id))
    }

    /// Validate a value against the schema registered under `schema_id`.
    pub fn validate_value(&self, value: &Value, schema_id: &str) -> Result<(), SchemaValidationError> {
        let schema = self
            .schema_map
            .get(schema_id)
            .ok_or_else(|| SchemaValidationError::SchemaNotFound(schema_id.to_string()))?;

        let retriever = LocalSchemaRetriever {
            schemas: self.schema_map.clone(),
        };

        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .with_retriever(retriever)
            .build(schema)
            .map_err(|e| SchemaValidationError::SchemaCompileError {
                schema_id: schema_id.to_string(),
                reason: e.to_string(),
            })?;

        let details: Vec<SchemaValidationDetail> = validator
            .iter_errors(value)
            .map(|err| SchemaValidationDetail {
                schema_id: schema_id.to_string(),
                instance_path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect();

        if details.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::ValidationFailed {
                schema_id: schema_id.to_string(),
                details,
            })
        }
    }

    /// Validate a value against the schema registered under `filename`.
    pub fn validate_value_by_filename(
        &self,
        value: &Value,
        filename: &str,
    ) -> Result<(), SchemaValidationError> {
        let schema_id = self
            .filename_to_id
            .get(filename)
            .ok_or_else(|| SchemaValidationError::SchemaNotFound(filename.to_string()))?;
        self.validate_value(value, schema_id)
    }

    /// Validate a parsed ADP manifest.
    pub fn validate_adp_document(&self, value: &Value) -> Result<(), SchemaValidationError> {
        self.validate_value_by_filename(value, ADP_SCHEMA)
    }

    /// Validate a parsed ACS container spec.
    pub fn validate_acs_document(&self, value: &Value) -> Result<(), SchemaValidationError> {
        self.validate_value_by_filename(value, ACS_SCHEMA)
    }

    /// Load a YAML (or JSON) document and validate it against `schema_filename`.
    pub fn validate_file(
        &self,
        path: &Path,
        schema_filename: &str,
    ) -> Result<(), SchemaValidationError> {
        let value = load_document(path)?;
        self.validate_value_by_filename(&value, schema_filename)
    }
}

impl ManifestValidator for SchemaValidator {
    fn validate(&self, document: &Value) -> Vec<String> {
        match self.validate_adp_document(document) {
            Ok(()) => Vec::new(),
            Err(e) => e.messages(),
        }
    }
}

/// Read a YAML or JSON document from disk.
pub fn load_document(path: &Path) -> Result<Value, SchemaValidationError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| SchemaValidationError::DocumentLoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    serde_yaml::from_str(&content).map_err(|e| SchemaValidationError::DocumentLoadError {
        path: path.display().to_string(),
        reason: format!("YAML parse error: {e}"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builtin() -> SchemaValidator {
        SchemaValidator::builtin().unwrap()
    }

    fn minimal() -> Value {
        json!({
            "adp_version": "0.1.0",
            "id": "agent.test",
            "runtime": {"execution": [{"backend": "python", "id": "py", "entrypoint": "main:app"}]},
            "flow": {},
            "evaluation": {}
        })
    }

    fn failure_details(result: Result<(), SchemaValidationError>) -> Vec<SchemaValidationDetail> {
        match result {
            Err(SchemaValidationError::ValidationFailed { details, .. }) => details,
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn builtin_registers_every_schema() {
        let v = builtin();
        assert_eq!(v.schema_count(), 5);
        assert!(v.schema_dir().is_none());
        for (name, _) in BUILTIN_SCHEMAS {
            assert!(v.get_schema_by_filename(name).is_some(), "{name}");
        }
    }

    #[test]
    fn minimal_manifest_is_valid() {
        builtin().validate_adp_document(&minimal()).unwrap();
    }

    #[test]
    fn multiple_backends_are_valid() {
        let mut doc = minimal();
        doc["runtime"]["execution"] = json!([
            {"backend": "docker", "id": "docker", "image": "acme/agent:1.0"},
            {"backend": "python", "id": "python", "entrypoint": ["python", "-m", "app"], "env": {"LOG_LEVEL": "info"}},
            {"backend": "wasm", "id": "wasm", "module": "agent.wasm"}
        ]);
        builtin().validate_adp_document(&doc).unwrap();
    }

    #[test]
    fn every_violation_is_reported() {
        let mut doc = minimal();
        doc["adp_version"] = json!("0.3.0");
        doc["id"] = json!("");
        doc["runtime"]["execution"] = json!([]);

        let details = failure_details(builtin().validate_adp_document(&doc));
        assert_eq!(details.len(), 3, "{details:?}");
        let paths: Vec<&str> = details.iter().map(|d| d.instance_path.as_str()).collect();
        assert!(paths.contains(&"/adp_version"));
        assert!(paths.contains(&"/id"));
        assert!(paths.contains(&"/runtime/execution"));
    }

    #[test]
    fn missing_execution_is_reported_through_runtime_ref() {
        let mut doc = minimal();
        doc["runtime"] = json!({});
        let details = failure_details(builtin().validate_adp_document(&doc));
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].instance_path, "/runtime");
        assert!(details[0].message.contains("execution"));
    }

    #[test]
    fn non_empty_flow_is_checked_against_flow_schema() {
        let mut doc = minimal();
        doc["flow"] = json!({"id": "x"});
        let details = failure_details(builtin().validate_adp_document(&doc));
        assert!(details.iter().any(|d| d.instance_path == "/flow" && d.message.contains("graph")));

        doc["flow"] = json!({
            "id": "test.flow",
            "graph": {
                "nodes": [
                    {"id": "input", "kind": "input"},
                    {"id": "llm", "kind": "llm", "model_ref": "primary"},
                    {"id": "output", "kind": "output"}
                ],
                "edges": [{"from": "input", "to": "llm"}, {"from": "llm", "to": "output"}],
                "start_nodes": ["input"],
                "end_nodes": ["output"]
            }
        });
        builtin().validate_adp_document(&doc).unwrap();
    }

    #[test]
    fn non_empty_evaluation_is_checked_against_evaluation_schema() {
        let mut doc = minimal();
        doc["evaluation"] = json!({"suites": [{"id": "smoke", "metrics": []}]});
        let details = failure_details(builtin().validate_adp_document(&doc));
        assert!(details
            .iter()
            .any(|d| d.instance_path == "/evaluation/suites/0/metrics"));

        doc["evaluation"] = json!({"suites": [{"id": "smoke", "metrics": [
            {"id": "latency", "type": "deterministic", "threshold": 0.9}
        ]}]});
        builtin().validate_adp_document(&doc).unwrap();
    }

    #[test]
    fn manifest_validator_flattens_details() {
        let mut doc = minimal();
        doc["runtime"]["execution"] = json!([]);
        let errors = ManifestValidator::validate(&builtin(), &doc);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("/runtime/execution: "), "{errors:?}");
        assert!(ManifestValidator::validate(&builtin(), &minimal()).is_empty());
    }

    #[test]
    fn acs_document_validation() {
        let v = builtin();
        let good = json!({
            "acs_version": "0.1.0",
            "base_image": "python:3.12-slim",
            "build": {"working_dir": "/app"},
            "runtime": {"command": ["uvicorn", "main:app"], "ports": [8080]}
        });
        v.validate_acs_document(&good).unwrap();

        let bad = json!({"acs_version": "0.1.0", "build": {}, "runtime": {"command": []}});
        let details = failure_details(v.validate_acs_document(&bad));
        assert!(details.len() >= 3, "{details:?}");
    }

    #[test]
    fn schemas_without_id_resolve_relative_refs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("root.schema.json"),
            r#"{"type": "object", "properties": {"child": {"$ref": "child.schema.json"}}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("child.schema.json"),
            r#"{"type": "object", "required": ["name"]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let v = SchemaValidator::new(dir.path()).unwrap();
        assert_eq!(v.schema_count(), 2);
        assert_eq!(
            v.get_schema_by_filename("root.schema.json").unwrap()["$id"],
            json!(format!("{SCHEMA_URI_PREFIX}root.schema.json"))
        );

        v.validate_value_by_filename(&json!({"child": {"name": "x"}}), "root.schema.json")
            .unwrap();
        let details = failure_details(
            v.validate_value_by_filename(&json!({"child": {}}), "root.schema.json"),
        );
        assert_eq!(details[0].instance_path, "/child");
    }

    #[test]
    fn unknown_schema_and_missing_dir() {
        assert!(matches!(
            builtin().validate_value_by_filename(&json!({}), "nope.schema.json"),
            Err(SchemaValidationError::SchemaNotFound(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SchemaValidator::new(dir.path().join("absent")),
            Err(SchemaValidationError::SchemaLoadError { .. })
        ));
    }

    #[test]
    fn invalid_schema_json_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.schema.json"), "{ not json").unwrap();
        assert!(matches!(
            SchemaValidator::new(dir.path()),
            Err(SchemaValidationError::SchemaLoadError { .. })
        ));
    }

    #[test]
    fn validate_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.yaml");
        std::fs::write(
            &path,
            "adp_version: \"0.2.0\"\nid: agent.file\nruntime:\n  execution:\n    - backend: python\n      id: py\nflow: {}\nevaluation: {}\n",
        )
        .unwrap();
        builtin().validate_file(&path, ADP_SCHEMA).unwrap();

        assert!(matches!(
            builtin().validate_file(&dir.path().join("missing.yaml"), ADP_SCHEMA),
            Err(SchemaValidationError::DocumentLoadError { .. })
        ));
    }

    #[test]
    fn detail_display_uses_root_slash() {
        let d = SchemaValidationDetail {
            schema_id: "x".into(),
            instance_path: String::new(),
            message: "\"id\" is a required property".into(),
        };
        assert_eq!(d.to_string(), "/: \"id\" is a required property");
    }
}
