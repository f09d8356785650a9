//! # ADP Manifest Model
//!
//! Typed view of an `adp/agent.yaml` document. The model is deliberately
//! permissive: it parses anything shaped like an ADP manifest and keeps
//! unknown top-level keys, leaving conformance rules to a
//! [`ManifestValidator`](crate::ManifestValidator). `flow` and `evaluation`
//! stay untyped JSON because packaging only carries them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ManifestError;

/// Agent version reported when a manifest does not declare one.
pub const DEFAULT_AGENT_VERSION: &str = "0.1.0";

/// A parsed ADP manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManifest {
    /// Protocol version the document conforms to (`0.1.0` or `0.2.0`).
    pub adp_version: String,
    /// Agent identifier; becomes the package title and config `agent_id`.
    pub id: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Agent release version, distinct from `adp_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Execution backends and model bindings.
    pub runtime: Runtime,
    /// Flow graph, carried opaquely. An empty object is ADP-Minimal.
    #[serde(default = "empty_object")]
    pub flow: Value,
    /// Evaluation suites, carried opaquely. An empty object is ADP-Minimal.
    #[serde(default = "empty_object")]
    pub evaluation: Value,
    /// Top-level keys this model does not name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The `runtime` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runtime {
    /// Execution backends; at least one for a valid manifest.
    #[serde(default)]
    pub execution: Vec<RuntimeEntry>,
    /// LLM bindings referenced from the flow graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<ModelBinding>>,
}

/// One execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEntry {
    /// Backend kind (`python`, `docker`, `wasm`, ...).
    pub backend: String,
    /// Identifier unique within the manifest.
    pub id: String,
    /// Entry point, either a single target or an argv list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Entrypoint>,
    /// Container image for container backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Module path for wasm backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Environment passed to the backend.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// A runtime entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entrypoint {
    /// `module:callable` or a single command.
    Target(String),
    /// Command plus arguments.
    Argv(Vec<String>),
}

/// An LLM binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBinding {
    /// Identifier referenced by flow nodes.
    pub id: String,
    /// Provider name.
    pub provider: String,
    /// Provider model name.
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Endpoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Provider-specific settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Parse YAML text into a JSON value, the form validators operate on.
pub fn parse_document(text: &str) -> Result<Value, ManifestError> {
    Ok(serde_yaml::from_str(text)?)
}

impl AgentManifest {
    /// Build the model from an already-parsed document.
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parse YAML text straight into the model.
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        Self::from_value(parse_document(text)?)
    }

    /// Render back to YAML.
    pub fn to_yaml_string(&self) -> Result<String, ManifestError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// The declared agent version, or [`DEFAULT_AGENT_VERSION`].
    pub fn agent_version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_AGENT_VERSION)
    }

    /// True when both `flow` and `evaluation` are empty objects.
    pub fn is_minimal(&self) -> bool {
        is_empty_object(&self.flow) && is_empty_object(&self.evaluation)
    }
}

fn is_empty_object(v: &Value) -> bool {
    v.as_object().is_some_and(|m| m.is_empty())
}
