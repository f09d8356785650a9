//! # Blob Store Error Types

use std::path::PathBuf;

use adp_core::{ContentDigest, DigestError};
use thiserror::Error;

/// Errors from digest computation and blob storage.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A digest string was malformed.
    #[error(transparent)]
    InvalidDigest(#[from] DigestError),

    /// No blob is stored under the digest.
    #[error("blob {digest} not found at {}", .path.display())]
    BlobNotFound {
        /// The requested digest.
        digest: ContentDigest,
        /// Where the blob was expected.
        path: PathBuf,
    },

    /// A stored blob's content no longer hashes to its name.
    #[error("integrity violation: blob at {} has digest {actual} but is stored as {expected}", .path.display())]
    Integrity {
        /// The digest the blob is stored under.
        expected: ContentDigest,
        /// The digest of the bytes actually on disk.
        actual: ContentDigest,
        /// Location of the blob.
        path: PathBuf,
    },

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
