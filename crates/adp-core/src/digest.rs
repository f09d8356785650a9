//! # Content-Addressed Digests
//!
//! Defines [`ContentDigest`] and [`DigestAlgorithm`]. A digest renders as
//! `"<algo>:<lowercase hex>"` everywhere it leaves the process: descriptor
//! `digest` fields, `index.json`, and the `blobs/<algo>/<hex>` path scheme.
//!
//! In-memory buffers are hashed here; streaming file and reader digests live
//! in `adp-crypto`, built on the same [`Sha256Accumulator`], so both paths
//! produce comparable values for identical content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::DigestError;

/// The hash algorithm used to compute a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    /// SHA-256, the only algorithm OCI layouts produced by this toolkit use.
    Sha256,
}

impl DigestAlgorithm {
    /// The lowercase algorithm identifier used in digest strings and blob paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Length of the raw digest in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            other => Err(DigestError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// A content digest with its algorithm tag.
///
/// Serializes as the `"sha256:<hex>"` string, so descriptors can embed it
/// directly and deserialization rejects malformed digests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Wrap a raw SHA-256 output.
    pub fn sha256(bytes: [u8; 32]) -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            bytes,
        }
    }

    /// Parse a `"<algo>:<hex>"` string.
    ///
    /// The hex part must be exactly the algorithm's output length and all
    /// lowercase; anything else is a [`DigestError`].
    pub fn parse(s: &str) -> Result<Self, DigestError> {
        let (algo, hex_part) = s
            .split_once(':')
            .ok_or_else(|| DigestError::MissingSeparator(s.to_string()))?;
        let algorithm: DigestAlgorithm = algo.parse()?;

        let expected = algorithm.output_len() * 2;
        if hex_part.len() != expected {
            return Err(DigestError::InvalidHex {
                input: s.to_string(),
                reason: format!("expected {expected} characters, got {}", hex_part.len()),
            });
        }
        if !hex_part
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(DigestError::InvalidHex {
                input: s.to_string(),
                reason: "only lowercase hex characters are allowed".to_string(),
            });
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut bytes).map_err(|e| DigestError::InvalidHex {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { algorithm, bytes })
    }

    /// The digest as a lowercase hex string, without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = DigestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.to_string()
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Incremental SHA-256 that also counts the bytes it has seen.
///
/// Feed it chunks of any size; the result is identical to hashing the
/// concatenation in one call.
#[derive(Clone, Default)]
pub struct Sha256Accumulator {
    hasher: Sha256,
    len: u64,
}

impl fmt::Debug for Sha256Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256Accumulator")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Sha256Accumulator {
    /// Start an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb another chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes absorbed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if nothing has been absorbed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish, returning the digest and the total byte count.
    pub fn finalize(self) -> (ContentDigest, u64) {
        let out: [u8; 32] = self.hasher.finalize().into();
        (ContentDigest::sha256(out), self.len)
    }
}

/// Digest an in-memory buffer, returning the digest and `buf.len()`.
pub fn digest_bytes(buf: &[u8]) -> (ContentDigest, u64) {
    let mut acc = Sha256Accumulator::new();
    acc.update(buf);
    acc.finalize()
}

/// Digest canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    digest_bytes(data.as_bytes()).0
}
