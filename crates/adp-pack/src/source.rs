//! Input checks shared by both packagers: required files, target shapes,
//! and manifest loading through the injected validator.

use std::fs;
use std::io;
use std::path::Path;

use adp_core::{parse_document, AgentManifest, ContainerSpec, ManifestValidator};
use tracing::debug;

use crate::error::{IoContext, MissingReason, PackError, PackResult};

/// Location of the ADP manifest inside a source tree or package.
pub const AGENT_MANIFEST_PATH: &str = "adp/agent.yaml";
/// Location of the ACS container spec inside a source tree or package.
pub const CONTAINER_SPEC_PATH: &str = "acs/container.yaml";

/// Require `root/relative` to be a regular file.
pub(crate) fn require_entry(root: &Path, relative: &str) -> PackResult<()> {
    match missing_reason(&root.join(relative))? {
        None => Ok(()),
        Some(reason) => Err(PackError::NotFound {
            entry: relative.to_string(),
            location: root.display().to_string(),
            reason,
        }),
    }
}

/// Require a standalone input path to be a regular file.
pub(crate) fn require_file(path: &Path) -> PackResult<()> {
    let Some(reason) = missing_reason(path)? else {
        return Ok(());
    };
    let entry = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let location = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.display().to_string(),
        _ => ".".to_string(),
    };
    Err(PackError::NotFound {
        entry,
        location,
        reason,
    })
}

/// `None` when `path` is a regular file.
fn missing_reason(path: &Path) -> PackResult<Option<MissingReason>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(None),
        Ok(meta) if meta.is_dir() => Ok(Some(MissingReason::Directory)),
        Ok(_) => Ok(Some(MissingReason::NotRegularFile)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Some(MissingReason::Absent)),
        Err(e) => Err(PackError::io(format!("inspecting {}", path.display()), e)),
    }
}

/// Read, parse and validate a manifest file.
///
/// Malformed YAML, validator findings and documents that do not fit the
/// typed model all surface as [`PackError::ValidationFailed`]. The caller
/// must have established that `path` is a regular file.
pub(crate) fn load_validated_manifest(
    path: &Path,
    validator: &dyn ManifestValidator,
) -> PackResult<AgentManifest> {
    let text = fs::read_to_string(path).io_context(|| format!("reading {}", path.display()))?;
    let rejected = |errors: Vec<String>| PackError::ValidationFailed {
        path: path.to_path_buf(),
        errors,
    };

    let document = parse_document(&text).map_err(|e| rejected(vec![e.to_string()]))?;
    let errors = validator.validate(&document);
    if !errors.is_empty() {
        debug!(path = %path.display(), count = errors.len(), "manifest rejected");
        return Err(rejected(errors));
    }
    AgentManifest::from_value(document).map_err(|e| rejected(vec![e.to_string()]))
}

/// Load an ACS container spec into its typed model.
///
/// A spec the model cannot represent (unparseable YAML, a missing required
/// section, an out-of-range number) is [`PackError::ValidationFailed`].
pub(crate) fn load_container_spec(path: &Path) -> PackResult<ContainerSpec> {
    let text = fs::read_to_string(path).io_context(|| format!("reading {}", path.display()))?;
    let spec = ContainerSpec::from_yaml_str(&text).map_err(|e| PackError::ValidationFailed {
        path: path.to_path_buf(),
        errors: vec![e.to_string()],
    })?;
    debug!(path = %path.display(), base_image = %spec.base_image, "container spec loaded");
    Ok(spec)
}

/// An OCI target must be directory-like: no extension, and not an
/// existing non-directory.
pub(crate) fn check_oci_target(out: &Path) -> PackResult<()> {
    if out.extension().is_some() {
        return Err(PackError::invalid_target(
            out,
            "an OCI layout target must be a directory path without an extension",
        ));
    }
    match fs::metadata(out) {
        Ok(meta) if !meta.is_dir() => Err(PackError::invalid_target(
            out,
            "exists and is not a directory",
        )),
        _ => Ok(()),
    }
}

/// An OPC target must not be an existing directory.
pub(crate) fn check_opc_target(out: &Path) -> PackResult<()> {
    if out.is_dir() {
        return Err(PackError::invalid_target(
            out,
            "an OPC package target must be a file path, found a directory",
        ));
    }
    Ok(())
}
