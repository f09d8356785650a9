//! # Schema Gate
//!
//! Packaging refuses manifests the schema set rejects, and writes nothing
//! when it does. Both the embedded schema set and the on-disk copy under
//! `crates/adp-schema/schemas/` must give the same answers.

mod common;

use std::fs;
use std::path::PathBuf;

use adp_core::{parse_document, ManifestValidator, StructuralValidator};
use adp_pack::{AnyPackage, PackError, Package, PackageFormat};
use adp_schema::SchemaValidator;

use common::{agent_yaml, snapshot, write_source};

fn schema_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../adp-schema/schemas")
}

type Labelled = (&'static str, Box<dyn ManifestValidator>);

fn validators() -> Vec<Labelled> {
    let builtin: Box<dyn ManifestValidator> = Box::new(SchemaValidator::builtin().unwrap());
    let on_disk: Box<dyn ManifestValidator> = Box::new(SchemaValidator::new(schema_dir()).unwrap());
    vec![("builtin", builtin), ("on-disk", on_disk)]
}

const FLOW: &str = "flow:
  id: main
  graph:
    nodes:
      - id: start
        kind: input
      - id: answer
        kind: llm
        model_ref: primary
    edges:
      - from: start
        to: answer
    start_nodes: [start]
    end_nodes: [answer]
";

fn manifest_with_flow(id: &str, flow: &str) -> String {
    agent_yaml(id).replace("flow: {}\n", flow)
}

#[test]
fn valid_flow_graph_is_packaged() {
    for (label, validator) in validators() {
        for format in [PackageFormat::Oci, PackageFormat::Opc] {
            let dir = tempfile::tempdir().unwrap();
            let src = write_source(dir.path(), "agent.flow");
            fs::write(src.join("adp/agent.yaml"), manifest_with_flow("agent.flow", FLOW)).unwrap();
            let out = match format {
                PackageFormat::Oci => dir.path().join("layout"),
                PackageFormat::Opc => dir.path().join("agent.adpkg"),
            };

            let pkg = AnyPackage::create(format, &src, &out, validator.as_ref())
                .unwrap_or_else(|e| panic!("{label}/{format}: {e}"));
            let manifest = pkg.read_manifest().unwrap();
            assert_eq!(manifest.flow["graph"]["start_nodes"][0], "start", "{label}/{format}");
        }
    }
}

#[test]
fn flow_without_graph_is_rejected() {
    let broken = "flow:\n  id: main\n";
    for (label, validator) in validators() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_source(dir.path(), "agent.flow");
        fs::write(src.join("adp/agent.yaml"), manifest_with_flow("agent.flow", broken)).unwrap();
        let before = snapshot(dir.path());

        let err = AnyPackage::create(PackageFormat::Oci, &src, &dir.path().join("layout"), validator.as_ref())
            .unwrap_err();
        match err {
            PackError::ValidationFailed { errors, .. } => {
                assert!(!errors.is_empty(), "{label}");
            }
            other => panic!("{label}: expected ValidationFailed, got {other:?}"),
        }
        assert_eq!(snapshot(dir.path()), before, "{label}");
    }
}

#[test]
fn unsupported_version_is_rejected_by_every_validator() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "agent.old");
    let yaml = agent_yaml("agent.old").replace("\"0.1.0\"", "\"9.9.9\"");
    fs::write(src.join("adp/agent.yaml"), yaml).unwrap();

    let mut all = validators();
    let structural: Box<dyn ManifestValidator> = Box::new(StructuralValidator);
    all.push(("structural", structural));
    for (label, validator) in all {
        let out = dir.path().join(format!("{label}.adpkg"));
        let err = AnyPackage::create(PackageFormat::Opc, &src, &out, validator.as_ref()).unwrap_err();
        assert!(matches!(err, PackError::ValidationFailed { .. }), "{label}: {err:?}");
        assert!(!out.exists(), "{label}");
    }
}

#[test]
fn malformed_yaml_is_a_validation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "agent.test");
    fs::write(src.join("adp/agent.yaml"), "id: [unclosed\n").unwrap();

    let validator = SchemaValidator::builtin().unwrap();
    let err = AnyPackage::create(PackageFormat::Oci, &src, &dir.path().join("layout"), &validator)
        .unwrap_err();
    assert!(matches!(err, PackError::ValidationFailed { .. }), "{err:?}");
    assert!(!dir.path().join("layout").exists());
}

#[test]
fn parsed_documents_are_judged_without_packaging() {
    let good = parse_document(&manifest_with_flow("agent.flow", FLOW)).unwrap();
    let bad = parse_document(&manifest_with_flow("agent.flow", "flow:\n  id: main\n")).unwrap();
    for (label, validator) in validators() {
        assert!(validator.validate(&good).is_empty(), "{label}");
        assert!(!validator.validate(&bad).is_empty(), "{label}");
    }
    assert!(parse_document("id: [unclosed\n").is_err());
}
