//! SHA-256 content hashing.
//!
//! File hashes are the sole basis for change detection between snapshots;
//! byte-wise comparison only happens when hashes disagree.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streaming SHA-256 of a file, hex-encoded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of a byte slice, hex-encoded.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_digest_for_empty_input() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_and_bytes_digests_agree() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"A1\t=SUM(A2:A3)\n").expect("write");
        let from_file = sha256_file(file.path()).expect("hash file");
        assert_eq!(from_file, sha256_bytes(b"A1\t=SUM(A2:A3)\n"));
    }

    #[test]
    fn single_byte_flip_changes_digest() {
        assert_ne!(sha256_bytes(b"A1\tfoo\n"), sha256_bytes(b"A1\tfoo!\n"));
    }
}
