//! # Streaming SHA-256
//!
//! Hashes files and readers in [`CHUNK_SIZE`] pieces so memory use stays
//! constant regardless of input size. Results match
//! [`adp_core::digest_bytes`] for the same content.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use adp_core::{ContentDigest, Sha256Accumulator};

use crate::error::CryptoError;

/// Read buffer size for streaming digests.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest everything a reader yields, returning the digest and byte count.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<(ContentDigest, u64), CryptoError> {
    let mut acc = Sha256Accumulator::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        acc.update(&buf[..n]);
    }
    Ok(acc.finalize())
}

/// Digest a file on disk.
pub fn digest_file(path: &Path) -> Result<(ContentDigest, u64), CryptoError> {
    digest_reader(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adp_core::digest_bytes;
    use std::io::Write;

    #[test]
    fn file_digest_matches_bytes_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        file.flush().unwrap();

        let (digest, size) = digest_file(file.path()).unwrap();
        assert_eq!(
            digest.to_hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(size, 5);
        assert_eq!((digest, size), digest_bytes(b"hello"));
    }

    #[test]
    fn multi_chunk_input() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let (digest, size) = digest_reader(std::io::Cursor::new(&data)).unwrap();
        assert_eq!(size, data.len() as u64);
        assert_eq!(digest, digest_bytes(&data).0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CryptoError::Io(ref e) if e.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn repeated_digest_is_stable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 1000]).unwrap();
        file.flush().unwrap();
        assert_eq!(
            digest_file(file.path()).unwrap(),
            digest_file(file.path()).unwrap()
        );
    }
}
