//! # adp-cli: the `adp` command
//!
//! ## Subcommands
//!
//! - `adp validate`: check ADP and/or ACS documents against the schemas.
//! - `adp pack`: build an `.adpkg` from a manifest, container spec, and
//!   optional `src/` and `eval/` trees.
//! - `adp bundle`: package a whole agent source tree as OCI or OPC.
//! - `adp unpack`: extract a package of either form.
//! - `adp inspect`: print identity, version and build metadata.
//! - `adp verify`: check digests (OCI) or CRCs (OPC).
//!
//! Every handler returns `Result<u8>`: `Ok(0)` on success, `Ok(1)` when the
//! input was rejected (validation failure, missing file, corrupt package),
//! and `Err` for operational failures, which `main` also maps to 1.
//!
//! ## Schema Resolution
//!
//! Validation uses, in order: `--schemas DIR`, `$ADP_SCHEMA_DIR`, the
//! nearest ancestor of the working directory containing
//! `schemas/adp.schema.json`, and finally the schema set compiled into
//! `adp-schema`.

pub mod inspect;
pub mod pack;
pub mod unpack;
pub mod validate;
pub mod verify;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use adp_pack::{ErrorKind, PackError};
use adp_schema::{SchemaValidator, ADP_SCHEMA};
use anyhow::{Context, Result};

/// Environment variable naming a schema directory.
pub const SCHEMA_DIR_ENV: &str = "ADP_SCHEMA_DIR";

/// Where the schema set comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// `--schemas DIR`.
    Flag(PathBuf),
    /// `$ADP_SCHEMA_DIR`.
    Env(PathBuf),
    /// A `schemas/` directory found above the working directory.
    Discovered(PathBuf),
    /// The schemas embedded at build time.
    Builtin,
}

impl SchemaSource {
    /// Apply the resolution order. `env` is the value of
    /// [`SCHEMA_DIR_ENV`]; `cwd` is where discovery starts.
    pub fn resolve(flag: Option<&Path>, env: Option<OsString>, cwd: &Path) -> Self {
        if let Some(dir) = flag {
            return Self::Flag(dir.to_path_buf());
        }
        if let Some(dir) = env.filter(|v| !v.is_empty()) {
            return Self::Env(PathBuf::from(dir));
        }
        tracing::debug!("{SCHEMA_DIR_ENV} not set; searching for schemas/ above {}", cwd.display());
        match discover_schema_dir(cwd) {
            Some(dir) => {
                tracing::debug!(dir = %dir.display(), "discovered schema directory");
                Self::Discovered(dir)
            }
            None => {
                tracing::debug!("no schemas/ directory found; using built-in schemas");
                Self::Builtin
            }
        }
    }

    /// Load the validator this source names.
    pub fn load(&self) -> Result<SchemaValidator> {
        let validator = match self {
            Self::Flag(dir) | Self::Env(dir) | Self::Discovered(dir) => SchemaValidator::new(dir)
                .with_context(|| format!("failed to load schemas from {}", dir.display()))?,
            Self::Builtin => {
                SchemaValidator::builtin().context("failed to load built-in schemas")?
            }
        };
        tracing::info!(
            source = ?self,
            schema_count = validator.schema_count(),
            "loaded schema registry"
        );
        Ok(validator)
    }
}

/// Walk up from `start` to the first directory holding `schemas/adp.schema.json`.
pub fn discover_schema_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join("schemas"))
        .find(|schemas| schemas.join(ADP_SCHEMA).is_file())
}

/// Print a rejected-input failure and return exit code 1; propagate
/// I/O failures to `main`.
pub(crate) fn report_failure(action: &str, err: PackError) -> Result<u8> {
    match err {
        PackError::ValidationFailed { path, errors } => {
            println!("FAIL: {action}: manifest {} failed validation", path.display());
            for e in errors {
                println!("  - {e}");
            }
            Ok(1)
        }
        err if err.kind() == ErrorKind::Io => {
            Err(anyhow::Error::new(err).context(format!("{action} failed")))
        }
        err => {
            println!("FAIL: {action}: {err}");
            Ok(1)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flag_wins_over_env() {
        let cwd = tempfile::tempdir().unwrap();
        let source = SchemaSource::resolve(
            Some(Path::new("/opt/schemas")),
            Some(OsString::from("/env/schemas")),
            cwd.path(),
        );
        assert_eq!(source, SchemaSource::Flag(PathBuf::from("/opt/schemas")));
    }

    #[test]
    fn env_wins_over_discovery() {
        let cwd = tempfile::tempdir().unwrap();
        let source = SchemaSource::resolve(None, Some(OsString::from("/env/schemas")), cwd.path());
        assert_eq!(source, SchemaSource::Env(PathBuf::from("/env/schemas")));
    }

    #[test]
    fn empty_env_is_ignored() {
        let cwd = tempfile::tempdir().unwrap();
        let source = SchemaSource::resolve(None, Some(OsString::new()), cwd.path());
        assert_eq!(source, SchemaSource::Builtin);
    }

    #[test]
    fn discovers_schemas_in_ancestor() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("schemas")).unwrap();
        fs::write(root.path().join("schemas").join(ADP_SCHEMA), "{}").unwrap();
        let nested = root.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            SchemaSource::resolve(None, None, &nested),
            SchemaSource::Discovered(root.path().join("schemas"))
        );
    }

    #[test]
    fn builtin_loads() {
        let validator = SchemaSource::Builtin.load().unwrap();
        assert_eq!(validator.schema_count(), 5);
    }

    #[test]
    fn missing_flag_dir_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = SchemaSource::Flag(dir.path().join("absent"));
        assert!(source.load().is_err());
    }

    #[test]
    fn io_failures_propagate() {
        let err = PackError::Io {
            context: "writing".into(),
            source: std::io::Error::other("disk full"),
        };
        assert!(report_failure("pack", err).is_err());
    }

    #[test]
    fn rejected_input_is_exit_one() {
        let err = PackError::InvalidTarget {
            path: PathBuf::from("out.tar"),
            reason: "has an extension".into(),
        };
        assert_eq!(report_failure("bundle", err).unwrap(), 1);
    }
}
