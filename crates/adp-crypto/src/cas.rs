//! # Content-Addressed Blob Store
//!
//! Stores byte blobs at `{root}/{algorithm}/{hex}`, the layout OCI image
//! layouts use under `blobs/`. A blob's name is its digest, so a blob is
//! written at most once and never changes afterwards.
//!
//! ## Write Protocol
//!
//! Content goes to a temporary file in the destination directory and is
//! then persisted with a no-clobber rename. Readers never observe a
//! partially written blob, and a concurrent writer of the same digest sees
//! `AlreadyExists`, which is treated as success.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use adp_core::{digest_bytes, ContentDigest, DigestAlgorithm};
use tracing::debug;

use crate::error::CryptoError;
use crate::sha256::digest_reader;

/// A filesystem-backed content-addressed blob store.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a store rooted at `root` (the `blobs/` directory of a layout).
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the blob for `digest`: `{root}/{algo}/{hex}`.
    pub fn path(&self, digest: &ContentDigest) -> PathBuf {
        self.algorithm_dir(digest.algorithm).join(digest.to_hex())
    }

    /// Location of the blob for a `"<algo>:<hex>"` string.
    ///
    /// Malformed strings are rejected before any path is built.
    pub fn path_for(&self, digest: &str) -> Result<PathBuf, CryptoError> {
        Ok(self.path(&ContentDigest::parse(digest)?))
    }

    fn algorithm_dir(&self, algorithm: DigestAlgorithm) -> PathBuf {
        self.root.join(algorithm.as_str())
    }

    /// Store `bytes` under `digest`.
    ///
    /// The caller vouches that `digest` is the digest of `bytes`; use
    /// [`verify`](Self::verify) to check a stored blob. Returns `true` when
    /// the blob was newly written and `false` when it already existed.
    pub fn put(&self, digest: &ContentDigest, bytes: &[u8]) -> Result<bool, CryptoError> {
        self.persist_new(digest, |f| f.write_all(bytes))
    }

    /// Digest `bytes`, store them, and return the digest and size.
    pub fn put_bytes(&self, bytes: &[u8]) -> Result<(ContentDigest, u64), CryptoError> {
        let (digest, size) = digest_bytes(bytes);
        self.put(&digest, bytes)?;
        Ok((digest, size))
    }

    /// Store the contents of the file at `src` under `digest`.
    ///
    /// The source file is copied, not moved; it stays owned by the caller.
    pub fn put_file(&self, digest: &ContentDigest, src: &Path) -> Result<bool, CryptoError> {
        self.persist_new(digest, |f| {
            let mut input = File::open(src)?;
            io::copy(&mut input, f).map(|_| ())
        })
    }

    fn persist_new(
        &self,
        digest: &ContentDigest,
        fill: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<bool, CryptoError> {
        let path = self.path(digest);
        if path.is_file() {
            debug!(%digest, "blob already present");
            return Ok(false);
        }

        let dir = self.algorithm_dir(digest.algorithm);
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".incoming-")
            .tempfile_in(&dir)?;
        fill(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(%digest, path = %path.display(), "stored blob");
                Ok(true)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!(%digest, "blob stored concurrently");
                Ok(false)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    /// Read a blob into memory.
    pub fn get(&self, digest: &ContentDigest) -> Result<Vec<u8>, CryptoError> {
        let path = self.path(digest);
        fs::read(&path).map_err(|e| self.map_missing(e, digest, path))
    }

    /// Open a blob for streaming reads.
    pub fn open(&self, digest: &ContentDigest) -> Result<File, CryptoError> {
        let path = self.path(digest);
        File::open(&path).map_err(|e| self.map_missing(e, digest, path))
    }

    fn map_missing(&self, e: io::Error, digest: &ContentDigest, path: PathBuf) -> CryptoError {
        if e.kind() == ErrorKind::NotFound {
            CryptoError::BlobNotFound {
                digest: digest.clone(),
                path,
            }
        } else {
            e.into()
        }
    }

    /// Whether a blob is stored under `digest`.
    pub fn contains(&self, digest: &ContentDigest) -> bool {
        self.path(digest).is_file()
    }

    /// Size in bytes of a stored blob.
    pub fn size(&self, digest: &ContentDigest) -> Result<u64, CryptoError> {
        Ok(self.open(digest)?.metadata()?.len())
    }

    /// Recompute a stored blob's digest, returning its size when it matches.
    pub fn verify(&self, digest: &ContentDigest) -> Result<u64, CryptoError> {
        let (actual, size) = digest_reader(self.open(digest)?)?;
        if &actual != digest {
            return Err(CryptoError::Integrity {
                expected: digest.clone(),
                actual,
                path: self.path(digest),
            });
        }
        Ok(size)
    }

    /// Hex names of every blob stored for `algorithm`, sorted.
    ///
    /// Files whose names are not valid digests (in-flight temporaries,
    /// stray files) are skipped.
    pub fn list(&self, algorithm: DigestAlgorithm) -> Result<BTreeSet<String>, CryptoError> {
        let dir = self.algorithm_dir(algorithm);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if ContentDigest::parse(&format!("{algorithm}:{name}")).is_ok() {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
