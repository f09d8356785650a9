//! Fixtures shared by the unit tests.

use std::fs;
use std::path::Path;

use serde_json::Value;

pub(crate) const MINIMAL_MANIFEST: &str = "adp_version: \"0.1.0\"
id: agent.test
runtime:
  execution:
    - backend: python
      id: py
      entrypoint: agent.main:run
flow: {}
evaluation: {}
";

const CONTAINER_SPEC: &str = "acs_version: \"0.1.0\"
base_image: python:3.11-slim
build:
  working_dir: /app
runtime:
  command: [\"python\", \"-m\", \"agent\"]
";

pub(crate) fn accept(_: &Value) -> Vec<String> {
    Vec::new()
}

/// Lay out a small agent project under `root`.
pub(crate) fn write_agent_tree(root: &Path) {
    for dir in ["adp", "acs", "src/agent", "eval", "metadata"] {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
    fs::write(root.join("adp/agent.yaml"), MINIMAL_MANIFEST).unwrap();
    fs::write(root.join("acs/container.yaml"), CONTAINER_SPEC).unwrap();
    fs::write(root.join("src/agent/main.py"), "def run():\n    return 'ok'\n").unwrap();
    fs::write(root.join("src/agent/__init__.py"), "").unwrap();
    fs::write(root.join("eval/smoke.yaml"), "suites: []\n").unwrap();
    fs::write(root.join("metadata/notes.json"), "{}\n").unwrap();
}
