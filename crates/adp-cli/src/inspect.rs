//! # Inspect Subcommand
//!
//! Prints what a package declares about itself: agent identity and
//! versions from `adp/agent.yaml`, the entry count, and build metadata when
//! the package carries any.

use std::path::PathBuf;

use adp_pack::{AnyPackage, Package, PackResult};
use anyhow::Result;
use clap::Args;
use serde_json::Value;

use crate::report_failure;

/// Arguments for the `adp inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Package to inspect (.adpkg file or OCI layout directory).
    #[arg(long)]
    pub pkg: PathBuf,
}

/// Execute the inspect subcommand.
pub fn run_inspect(args: &InspectArgs) -> Result<u8> {
    match AnyPackage::open(&args.pkg).and_then(|pkg| describe(&pkg)) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            Ok(0)
        }
        Err(e) => report_failure("inspect", e),
    }
}

/// Human-readable summary lines for a package.
pub fn describe(pkg: &AnyPackage) -> PackResult<Vec<String>> {
    let manifest = pkg.read_manifest()?;
    let entries = pkg.list_entries()?;
    let metadata = pkg.read_metadata()?;

    let mut lines = vec![
        format!("Package: {} ({})", pkg.path().display(), pkg.format()),
        format!("- Agent id: {}", manifest.id),
        format!("- Agent name: {}", manifest.name.as_deref().unwrap_or("unknown")),
        format!("- ADP version: {}", manifest.adp_version),
        format!("- Entries: {}", entries.len()),
    ];
    match metadata {
        Some(meta) => {
            let field = |key: &str| meta.get(key).and_then(Value::as_str).map(str::to_owned);
            let version = field("agent_version").unwrap_or_else(|| manifest.agent_version().to_string());
            lines.push(format!("- Agent version: {version}"));
            lines.push(format!(
                "- Build timestamp: {}",
                field("build_timestamp").as_deref().unwrap_or("n/a")
            ));
        }
        None => {
            lines.push(format!("- Agent version: {}", manifest.agent_version()));
            lines.push("- Metadata: not present".to_string());
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use adp_pack::{OpcPackage, PackInputs};
    use adp_schema::SchemaValidator;

    #[test]
    fn describes_stamped_archive() {
        let dir = tempfile::tempdir().unwrap();
        let project = fixtures::project(dir.path());
        let out = dir.path().join("agent.adpkg");
        let inputs = PackInputs {
            agent: project.join("agent.yaml"),
            acs: project.join("container.yaml"),
            src: project.join("src"),
            eval: project.join("eval"),
        };
        OpcPackage::pack(&inputs, &out, &SchemaValidator::builtin().unwrap()).unwrap();

        let lines = describe(&AnyPackage::open(&out).unwrap()).unwrap();
        assert!(lines[0].ends_with("(opc)"));
        assert!(lines.contains(&"- Agent id: agent.test".to_string()));
        assert!(lines.contains(&"- Agent name: Test Agent".to_string()));
        assert!(lines.contains(&"- Agent version: 1.2.0".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("- Build timestamp: 20")));
    }

    #[test]
    fn describes_oci_layout() {
        let dir = tempfile::tempdir().unwrap();
        let project = fixtures::project(dir.path());
        let out = dir.path().join("layout");
        AnyPackage::create(
            adp_pack::PackageFormat::Oci,
            &project.join("tree"),
            &out,
            &SchemaValidator::builtin().unwrap(),
        )
        .unwrap();

        let lines = describe(&AnyPackage::open(&out).unwrap()).unwrap();
        assert!(lines[0].ends_with("(oci)"));
        assert!(lines.contains(&"- Agent version: 1.2.0".to_string()));
        assert!(lines.contains(&"- Build timestamp: n/a".to_string()));
    }

    #[test]
    fn missing_package_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_inspect(&InspectArgs {
            pkg: dir.path().join("nothing.adpkg"),
        })
        .unwrap();
        assert_eq!(code, 1);
    }
}
