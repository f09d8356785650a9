//! # adp-schema: Schema Validation for ADP and ACS Documents
//!
//! Validates manifests against the JSON Schema corpus in this crate's
//! `schemas/` directory. The root ADP schema references
//! `runtime.schema.json`, `flow.schema.json` and `evaluation.schema.json` by
//! relative identifier; those references are
//! resolved against the loaded schema set, never over the network.
//!
//! A copy of the corpus is embedded at build time ([`SchemaValidator::builtin`])
//! so the toolkit works outside a checkout. [`SchemaValidator`] implements
//! [`ManifestValidator`](adp_core::ManifestValidator) and can be handed
//! straight to a packager.

pub mod validate;

// Re-export primary types.
pub use validate::{
    load_document, SchemaValidationDetail, SchemaValidationError, SchemaValidator, ACS_SCHEMA,
    ADP_SCHEMA, SCHEMA_URI_PREFIX,
};
