//! # ACS Container Spec Model
//!
//! Typed view of `acs/container.yaml`: how to build and run the agent's
//! container image. Packages carry the file verbatim; the model exists for
//! inspection and for callers that want typed access.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// A parsed ACS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Spec version.
    pub acs_version: String,
    /// Image the build starts from.
    pub base_image: String,
    /// Build instructions.
    pub build: Build,
    /// Container runtime settings.
    pub runtime: ContainerRuntime,
    /// Observability wiring.
    #[serde(default)]
    pub telemetry_bindings: TelemetryBindings,
    /// Evaluation hooks.
    #[serde(default)]
    pub eval_bindings: EvalBindings,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub working_dir: String,
    #[serde(default)]
    pub copy: Vec<CopySpec>,
    #[serde(default)]
    pub dependencies: Dependencies,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    pub src: String,
    pub dest: String,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub python: Vec<String>,
    #[serde(default)]
    pub system: Vec<String>,
}

/// Process settings for the running container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRuntime {
    /// Command vector; must not be empty for a valid spec.
    pub command: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment as `NAME=value` strings or a name-to-value map.
    #[serde(default)]
    pub env: EnvSpec,
    #[allow(missing_docs)]
    #[serde(default)]
    pub ports: Vec<u16>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
}

/// Container environment, accepted in either list or map form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvSpec {
    /// `["NAME=value", ...]`
    List(Vec<String>),
    /// `{NAME: value, ...}`
    Map(BTreeMap<String, String>),
}

impl Default for EnvSpec {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Healthcheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryBindings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otel: Option<Otel>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Otel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalBindings {
    #[serde(default)]
    pub on_startup: SuiteList,
    #[serde(default)]
    pub on_deploy: RequiredSuites,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteList {
    #[serde(default)]
    pub run_suites: Vec<String>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSuites {
    #[serde(default)]
    pub require_passing_suites: Vec<String>,
}

impl ContainerSpec {
    /// Parse YAML text into the model.
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(text)?)
    }
}
