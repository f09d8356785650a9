//! # Error Hierarchy
//!
//! Structured error types for the core crate, built with `thiserror`.
//! Higher layers wrap these in their own enums; the CLI is the only place
//! that turns them into exit codes.

use thiserror::Error;

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Non-integer numbers have no single canonical rendering across
    /// producers, so they are refused outright.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors parsing a `"<algo>:<hex>"` digest string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The string has no `:` separating algorithm and hex.
    #[error("invalid digest \"{0}\" (expected <algorithm>:<hex>)")]
    MissingSeparator(String),

    /// The algorithm prefix is not one this toolkit computes.
    #[error("unsupported digest algorithm \"{0}\" (expected sha256)")]
    UnsupportedAlgorithm(String),

    /// The hex part has the wrong length or contains non lowercase-hex characters.
    #[error("invalid digest hex \"{input}\": {reason}")]
    InvalidHex {
        /// The full digest string as given.
        input: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors turning a YAML/JSON document into an ADP or ACS model.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The text is not well-formed YAML.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed but does not fit the typed model.
    #[error("document does not match the model: {0}")]
    Shape(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_error_messages_name_the_input() {
        let err = DigestError::MissingSeparator("abc".into());
        assert!(err.to_string().contains("\"abc\""));

        let err = DigestError::UnsupportedAlgorithm("md5".into());
        assert!(err.to_string().contains("md5"));

        let err = DigestError::InvalidHex {
            input: "sha256:zz".into(),
            reason: "expected 64 characters, got 2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sha256:zz"));
        assert!(msg.contains("64"));
    }

    #[test]
    fn float_rejected_display() {
        let err = CanonicalizationError::FloatRejected(0.5);
        assert!(err.to_string().contains("0.5"));
    }
}
