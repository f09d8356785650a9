//! Package error taxonomy.
//!
//! Every failure a packager or reader can report falls into one of five
//! categories. [`PackError::kind`] exposes the category for callers that
//! branch on it (the CLI maps all of them to exit code 1).

use std::fmt;
use std::io;
use std::path::PathBuf;

use adp_crypto::CryptoError;
use thiserror::Error;

/// Why a required entry could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// Nothing exists under the name.
    Absent,
    /// A directory sits where a regular file is required.
    Directory,
    /// Something other than a regular file or directory (socket, device, link).
    NotRegularFile,
    /// A regular file sits where a directory is required.
    NotDirectory,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "not found",
            Self::Directory => "is a directory, not a regular file",
            Self::NotRegularFile => "is not a regular file",
            Self::NotDirectory => "is not a directory",
        })
    }
}

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidTarget,
    ValidationFailed,
    CorruptPackage,
    Io,
}

/// Errors from packaging, reading, verifying and extracting packages.
#[derive(Debug, Error)]
pub enum PackError {
    /// A required file or archive entry is missing or has the wrong type.
    #[error("{entry} {reason} in {location}")]
    NotFound {
        entry: String,
        location: String,
        reason: MissingReason,
    },

    /// The output path cannot hold a package of the requested form.
    #[error("invalid package target {path}: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    /// The manifest was rejected; nothing was written.
    #[error("manifest {path} failed validation: {}", .errors.join("; "))]
    ValidationFailed { path: PathBuf, errors: Vec<String> },

    /// The package exists but its structure or content is damaged.
    #[error("corrupt package {path}: {detail}")]
    CorruptPackage { path: PathBuf, detail: String },

    /// Filesystem failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Convenience alias.
pub type PackResult<T> = Result<T, PackError>;

impl PackError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTarget { .. } => ErrorKind::InvalidTarget,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::CorruptPackage { .. } => ErrorKind::CorruptPackage,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::CorruptPackage {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_target(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Attach a context string to I/O results.
pub(crate) trait IoContext<T> {
    fn io_context(self, context: impl FnOnce() -> String) -> PackResult<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, context: impl FnOnce() -> String) -> PackResult<T> {
        self.map_err(|e| PackError::io(context(), e))
    }
}

impl From<CryptoError> for PackError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::BlobNotFound { ref path, .. } | CryptoError::Integrity { ref path, .. } => {
                let path = path.clone();
                PackError::corrupt(path, err.to_string())
            }
            CryptoError::InvalidDigest(e) => PackError::corrupt(PathBuf::new(), e.to_string()),
            CryptoError::Io(e) => PackError::io("blob store", e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use adp_core::digest_bytes;

    #[test]
    fn not_found_names_entry_reason_and_location() {
        let err = PackError::NotFound {
            entry: "adp/agent.yaml".into(),
            location: "layer sha256:abc".into(),
            reason: MissingReason::Directory,
        };
        assert_eq!(
            err.to_string(),
            "adp/agent.yaml is a directory, not a regular file in layer sha256:abc"
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn absent_reason_reads_not_found() {
        assert_eq!(MissingReason::Absent.to_string(), "not found");
    }

    #[test]
    fn validation_failed_lists_every_error() {
        let err = PackError::ValidationFailed {
            path: PathBuf::from("src/adp/agent.yaml"),
            errors: vec!["id is required".into(), "flow is required".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("id is required; flow is required"));
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn missing_blob_becomes_corrupt_package() {
        let (digest, _) = digest_bytes(b"gone");
        let err: PackError = CryptoError::BlobNotFound {
            digest,
            path: PathBuf::from("/pkg/blobs/sha256/dead"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::CorruptPackage);
        assert!(err.to_string().contains("/pkg/blobs/sha256/dead"));
    }

    #[test]
    fn integrity_failure_becomes_corrupt_package() {
        let (expected, _) = digest_bytes(b"a");
        let (actual, _) = digest_bytes(b"b");
        let err: PackError = CryptoError::Integrity {
            expected,
            actual,
            path: PathBuf::from("blob"),
        }
        .into();
        assert!(matches!(err, PackError::CorruptPackage { .. }));
    }

    #[test]
    fn store_io_keeps_source() {
        let err: PackError = CryptoError::Io(io::Error::other("disk full")).into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_context_wraps() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let err = res.io_context(|| "writing index.json".into()).unwrap_err();
        assert_eq!(err.to_string(), "writing index.json: denied");
    }
}
