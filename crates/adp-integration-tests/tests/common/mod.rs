//! Fixtures shared across integration test binaries.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

pub fn agent_yaml(id: &str) -> String {
    format!(
        "adp_version: \"0.1.0\"
id: {id}
name: Scenario Agent
runtime:
  execution:
    - backend: python
      id: py
      entrypoint: agent.main:app
flow: {{}}
evaluation: {{}}
"
    )
}

pub const CONTAINER_YAML: &str = "acs_version: \"0.1.0\"
base_image: python:3.12-slim
build:
  working_dir: /app
runtime:
  command: [\"python\", \"-m\", \"agent\"]
";

/// Source tree with ADP manifest, ACS spec, code, eval and metadata.
pub fn write_source(root: &Path, id: &str) -> PathBuf {
    let src = root.join("source");
    for dir in ["adp", "acs", "src/agent", "eval", "metadata"] {
        fs::create_dir_all(src.join(dir)).unwrap();
    }
    fs::write(src.join("adp/agent.yaml"), agent_yaml(id)).unwrap();
    fs::write(src.join("acs/container.yaml"), CONTAINER_YAML).unwrap();
    fs::write(src.join("src/agent/main.py"), "app = object()\n").unwrap();
    fs::write(src.join("eval/basic.yaml"), "suites: []\n").unwrap();
    fs::write(src.join("metadata/owner.json"), "{\"team\": \"qa\"}\n").unwrap();
    src
}

pub fn accept_all(_: &Value) -> Vec<String> {
    Vec::new()
}

pub fn reject_all(_: &Value) -> Vec<String> {
    vec!["rejected by test validator".to_string()]
}

/// Every path under `root`, relative and sorted.
pub fn snapshot(root: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            out.push(path.strip_prefix(root).unwrap().display().to_string());
            if path.is_dir() {
                stack.push(path);
            }
        }
    }
    out.sort();
    out
}
