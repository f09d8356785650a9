//! # adp-pack: ADPKG Packaging
//!
//! Packages an agent source tree into one of two interchangeable forms and
//! reads it back:
//!
//! - **OCI image layout** ([`OciPackage`]): a directory with `oci-layout`,
//!   `index.json` and content-addressed blobs. The layer is a tar of the
//!   whole source tree built with normalized headers, so equal trees yield
//!   equal digests.
//! - **OPC-style ZIP** ([`OpcPackage`]): a single `.adpkg` archive with a
//!   `[Content_Types].xml` part, the ADP and ACS documents, payload trees
//!   and `metadata/version.json`.
//!
//! Packagers never embed a schema engine. They take a
//! [`ManifestValidator`](adp_core::ManifestValidator) and write nothing
//! when it reports errors.
//!
//! ## Errors
//!
//! All operations return [`PackResult`]. [`PackError::kind`] classifies a
//! failure as not-found, invalid target, validation failure, corrupt
//! package or I/O.

pub mod error;
pub mod layout;
pub mod oci;
pub mod opc;
pub mod package;
pub mod source;
pub mod walk;

mod extract;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, MissingReason, PackError, PackResult};
pub use layout::{Descriptor, ImageIndex, ImageManifest, OciLayout, PackageConfig};
pub use oci::OciPackage;
pub use opc::{BuildMetadata, OpcPackage, PackInputs};
pub use package::{AnyPackage, Package, PackageFormat};
pub use source::{AGENT_MANIFEST_PATH, CONTAINER_SPEC_PATH};
pub use walk::{relative_path, SourceFile, SourceTree};
