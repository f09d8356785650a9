//! # Package Abstraction
//!
//! [`Package`] is the capability both ADPKG forms share. [`AnyPackage`]
//! dispatches at runtime for callers that only learn the form from a path,
//! and [`PackageFormat`] decides which form a path denotes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use adp_core::{AgentManifest, ManifestValidator};
use serde_json::Value;

use crate::error::{MissingReason, PackError, PackResult};
use crate::layout::OCI_LAYOUT_FILE;
use crate::oci::OciPackage;
use crate::opc::OpcPackage;

/// Operations common to OCI layouts and OPC archives.
pub trait Package: Sized {
    /// Package the tree rooted at `src` into `out`.
    ///
    /// `src/adp/agent.yaml` must exist and pass `validator`; on any
    /// precondition failure nothing is written at `out`.
    fn create_from_directory(
        src: &Path,
        out: &Path,
        validator: &dyn ManifestValidator,
    ) -> PackResult<Self>;

    /// Bind to an existing package.
    fn open(path: &Path) -> PackResult<Self>;

    /// Where the package lives.
    fn path(&self) -> &Path;

    /// Read and parse the packaged `adp/agent.yaml`.
    fn read_manifest(&self) -> PackResult<AgentManifest>;

    /// Names of the packaged files.
    fn list_entries(&self) -> PackResult<Vec<String>>;

    /// Build metadata (OPC) or the config blob (OCI).
    fn read_metadata(&self) -> PackResult<Option<Value>>;

    /// Check structural integrity and content digests.
    fn verify(&self) -> PackResult<()>;

    /// Extract the packaged files into `out_dir`.
    fn unpack(&self, out_dir: &Path) -> PackResult<PathBuf>;
}

/// The two ADPKG forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    /// OCI image layout directory.
    Oci,
    /// OPC-style ZIP archive.
    Opc,
}

impl PackageFormat {
    /// Form of an existing package.
    pub fn detect(path: &Path) -> PackResult<Self> {
        if path.is_file() {
            return Ok(Self::Opc);
        }
        if path.is_dir() {
            if path.join(OCI_LAYOUT_FILE).is_file() {
                return Ok(Self::Oci);
            }
            return Err(PackError::NotFound {
                entry: OCI_LAYOUT_FILE.to_string(),
                location: path.display().to_string(),
                reason: MissingReason::Absent,
            });
        }
        Err(PackError::NotFound {
            entry: path.display().to_string(),
            location: "the filesystem".into(),
            reason: MissingReason::Absent,
        })
    }

    /// Form implied by an output path: an existing directory or an
    /// extension-less path is OCI, anything else OPC.
    pub fn for_target(path: &Path) -> Self {
        if path.is_dir() || path.extension().is_none() {
            Self::Oci
        } else {
            Self::Opc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oci => "oci",
            Self::Opc => "opc",
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oci" => Ok(Self::Oci),
            "opc" | "zip" | "adpkg" => Ok(Self::Opc),
            other => Err(format!("unknown package format {other:?} (expected oci or opc)")),
        }
    }
}

/// A package of either form.
#[derive(Debug, Clone)]
pub enum AnyPackage {
    Oci(OciPackage),
    Opc(OpcPackage),
}

macro_rules! dispatch {
    ($self:expr, $pkg:ident => $body:expr) => {
        match $self {
            AnyPackage::Oci($pkg) => $body,
            AnyPackage::Opc($pkg) => $body,
        }
    };
}

impl AnyPackage {
    /// Create a package of an explicit form.
    pub fn create(
        format: PackageFormat,
        src: &Path,
        out: &Path,
        validator: &dyn ManifestValidator,
    ) -> PackResult<Self> {
        Ok(match format {
            PackageFormat::Oci => Self::Oci(OciPackage::create_from_directory(src, out, validator)?),
            PackageFormat::Opc => Self::Opc(OpcPackage::create_from_directory(src, out, validator)?),
        })
    }

    pub fn format(&self) -> PackageFormat {
        match self {
            Self::Oci(_) => PackageFormat::Oci,
            Self::Opc(_) => PackageFormat::Opc,
        }
    }
}

impl Package for AnyPackage {
    /// Form chosen by [`PackageFormat::for_target`].
    fn create_from_directory(
        src: &Path,
        out: &Path,
        validator: &dyn ManifestValidator,
    ) -> PackResult<Self> {
        Self::create(PackageFormat::for_target(out), src, out, validator)
    }

    fn open(path: &Path) -> PackResult<Self> {
        Ok(match PackageFormat::detect(path)? {
            PackageFormat::Oci => Self::Oci(OciPackage::open(path)?),
            PackageFormat::Opc => Self::Opc(OpcPackage::open(path)?),
        })
    }

    fn path(&self) -> &Path {
        dispatch!(self, p => p.path())
    }

    fn read_manifest(&self) -> PackResult<AgentManifest> {
        dispatch!(self, p => p.read_manifest())
    }

    fn list_entries(&self) -> PackResult<Vec<String>> {
        dispatch!(self, p => p.list_entries())
    }

    fn read_metadata(&self) -> PackResult<Option<Value>> {
        dispatch!(self, p => p.read_metadata())
    }

    fn verify(&self) -> PackResult<()> {
        dispatch!(self, p => p.verify())
    }

    fn unpack(&self, out_dir: &Path) -> PackResult<PathBuf> {
        dispatch!(self, p => p.unpack(out_dir))
    }
}
