//! # adp-crypto: Digests and Content-Addressed Storage
//!
//! - **Streaming digests** over files and arbitrary readers in fixed-size
//!   chunks, producing [`ContentDigest`](adp_core::ContentDigest) values
//!   comparable with in-memory [`digest_bytes`](adp_core::digest_bytes).
//! - **Blob store** laid out as `blobs/<algo>/<hex>`, the on-disk scheme of
//!   an OCI image layout. Writes are idempotent and atomic.

pub mod cas;
pub mod error;
pub mod sha256;

// Re-export primary types.
pub use cas::BlobStore;
pub use error::CryptoError;
pub use sha256::{digest_file, digest_reader, CHUNK_SIZE};
