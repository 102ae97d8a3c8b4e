//! Cryptographic hashing helpers backing the multi-algorithm checksum
//! calculator (SHA-256, SHA-1, MD5).

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::io::Read;
use std::path::Path;

use crate::errors::AetherError;

/// Compute the SHA-256 hash of a file, returning a lowercase hex string.
pub fn sha256_file(path: &Path) -> miette::Result<String> {
    hash_file::<Sha256>(path)
}

/// Compute the SHA-1 hash of a file, returning a lowercase hex string.
pub fn sha1_file(path: &Path) -> miette::Result<String> {
    hash_file::<Sha1>(path)
}

/// Compute the MD5 hash of a file, returning a lowercase hex string.
pub fn md5_file(path: &Path) -> miette::Result<String> {
    hash_file::<Md5>(path)
}

/// Compute the SHA-512 hash of a file, returning a lowercase hex string.
pub fn sha512_file(path: &Path) -> miette::Result<String> {
    hash_file::<Sha512>(path)
}

/// Hash a file with whichever [`ChecksumAlgorithm`] is named.
pub fn hash_file_with(algorithm: ChecksumAlgorithm, path: &Path) -> miette::Result<String> {
    match algorithm {
        ChecksumAlgorithm::Md5 => md5_file(path),
        ChecksumAlgorithm::Sha1 => sha1_file(path),
        ChecksumAlgorithm::Sha256 => sha256_file(path),
        ChecksumAlgorithm::Sha512 => sha512_file(path),
    }
}

fn hash_file<D: Digest>(path: &Path) -> miette::Result<String> {
    let mut file = std::fs::File::open(path).map_err(AetherError::Io)?;
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer).map_err(AetherError::Io)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex(&hasher.finalize()))
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{:02x}", b).expect("writing to String never fails");
    }
    out
}

/// Compute the SHA-256 hash of a file using a buffered streaming reader,
/// without loading the entire file into memory.
pub fn sha256_file_streaming(path: &Path) -> std::io::Result<String> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(64 * 1024, file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-1 hash of a byte slice, returning a lowercase hex string.
pub fn sha1_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the MD5 hash of a byte slice, returning a lowercase hex string.
pub fn md5_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// The checksum algorithms the calculator tries, in the order the spec's
/// checksum policy prefers them (strongest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChecksumAlgorithm {
    Sha512,
    Sha256,
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha512 => "SHA-512",
            ChecksumAlgorithm::Sha256 => "SHA-256",
            ChecksumAlgorithm::Sha1 => "SHA-1",
            ChecksumAlgorithm::Md5 => "MD5",
        }
    }

    /// Sidecar file extension for this algorithm (e.g. `.sha256`).
    pub fn extension(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha512 => "sha512",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Md5 => "md5",
        }
    }

    /// All supported algorithms, strongest first — the order the
    /// calculator probes sidecar files and builds its digest set in.
    pub const ALL: [ChecksumAlgorithm; 4] = [
        ChecksumAlgorithm::Sha512,
        ChecksumAlgorithm::Sha256,
        ChecksumAlgorithm::Sha1,
        ChecksumAlgorithm::Md5,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_matches_known_vector() {
        assert_eq!(sha1_bytes(b"hello"), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn md5_matches_known_vector() {
        assert_eq!(md5_bytes(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn algorithm_order_is_strongest_first() {
        assert_eq!(ChecksumAlgorithm::ALL[0], ChecksumAlgorithm::Sha512);
        assert_eq!(ChecksumAlgorithm::ALL[3], ChecksumAlgorithm::Md5);
    }
}
