#![deny(missing_docs)]

//! # adp-core: Foundational Types for the ADP Toolkit
//!
//! Every other crate in the workspace builds on the types defined here. The
//! crate has no internal dependencies and performs no filesystem I/O.
//!
//! ## Design Principles
//!
//! 1. **Digests are typed.** A [`ContentDigest`] carries its algorithm and raw
//!    bytes; the `"<algo>:<hex>"` string form only exists at serialization
//!    boundaries. Malformed digest strings are rejected when parsed.
//!
//! 2. **[`CanonicalBytes`] for structured digests.** Any JSON record whose
//!    digest must be reproducible (the package config blob) is serialized
//!    through RFC 8785 canonicalization.
//!
//! 3. **Validation is a capability.** Packaging code receives a
//!    [`ManifestValidator`] instead of importing a schema engine, so callers
//!    decide which rules apply and tests can inject fakes.
//!
//! 4. **Structured errors.** `thiserror` enums throughout; no `.unwrap()`
//!    outside tests.

pub mod canonical;
pub mod container;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod validation;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use container::ContainerSpec;
pub use digest::{digest_bytes, sha256_digest, ContentDigest, DigestAlgorithm, Sha256Accumulator};
pub use error::{CanonicalizationError, DigestError, ManifestError};
pub use manifest::{parse_document, AgentManifest, Entrypoint, ModelBinding, Runtime, RuntimeEntry};
pub use validation::{ManifestValidator, StructuralValidator};
