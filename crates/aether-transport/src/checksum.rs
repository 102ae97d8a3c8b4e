//! Multi-algorithm checksum calculator (§4.D.2): pipes a downloaded byte
//! stream through a fixed subset of {MD5, SHA-1, SHA-256, SHA-512}
//! simultaneously, with resume-offset validity tracking.

use std::collections::BTreeMap;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use aether_util::errors::AetherError;
use aether_util::hash::ChecksumAlgorithm;

/// Verification behaviour on checksum mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPolicy {
    Fail,
    Warn,
    Ignore,
}

/// Accumulates digests for a configured set of algorithms across a
/// (possibly resumed) byte stream.
#[derive(Clone)]
pub struct ChecksumCalculator {
    algorithms: Vec<ChecksumAlgorithm>,
    offset: u64,
    consumed: u64,
    valid: bool,
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
    sha512: Sha512,
}

impl ChecksumCalculator {
    pub fn new(algorithms: &[ChecksumAlgorithm]) -> Self {
        let mut calc = Self {
            algorithms: algorithms.to_vec(),
            offset: 0,
            consumed: 0,
            valid: true,
            md5: Md5::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
            sha512: Sha512::new(),
        };
        calc.reset_hashers();
        calc
    }

    fn reset_hashers(&mut self) {
        self.md5 = Md5::new();
        self.sha1 = Sha1::new();
        self.sha256 = Sha256::new();
        self.sha512 = Sha512::new();
    }

    /// Discards prior hasher state and records `offset`. If `offset > 0`
    /// the calculator is marked invalid until the bytes already on disk
    /// are replayed through [`Self::update`] (see [`Self::feed_replay`]);
    /// a resume that skips the replay step produces only error entries
    /// from [`Self::get`].
    pub fn init(&mut self, offset: u64) {
        self.offset = offset;
        self.consumed = 0;
        self.valid = offset == 0;
        self.reset_hashers();
    }

    /// Feed bytes already present locally (the partial file's existing
    /// content) back through the hasher so a resumed download produces a
    /// checksum over the *whole* artifact, not just the resumed tail.
    pub fn feed_replay(&mut self, bytes: &[u8]) {
        self.update(bytes);
        if self.consumed >= self.offset {
            self.valid = true;
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.consumed += bytes.len() as u64;
        for algo in &self.algorithms {
            match algo {
                ChecksumAlgorithm::Md5 => self.md5.update(bytes),
                ChecksumAlgorithm::Sha1 => self.sha1.update(bytes),
                ChecksumAlgorithm::Sha256 => self.sha256.update(bytes),
                ChecksumAlgorithm::Sha512 => self.sha512.update(bytes),
            }
        }
    }

    /// Finalises every algorithm in [`ChecksumAlgorithm::ALL`]. Entries
    /// for algorithms this calculator wasn't configured to track, or for
    /// an offset-overrun (unreplayed resume), carry an I/O error marker
    /// instead of a digest.
    pub fn get(&self) -> BTreeMap<ChecksumAlgorithm, miette::Result<String>> {
        let mut out = BTreeMap::new();
        for algo in ChecksumAlgorithm::ALL {
            let result = if !self.valid {
                Err(AetherError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("checksum offset {} not replayed before finalize", self.offset),
                ))
                .into())
            } else if !self.algorithms.contains(&algo) {
                Err(AetherError::Io(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    format!("{} not configured for this calculator", algo.name()),
                ))
                .into())
            } else {
                Ok(hex(&match algo {
                    ChecksumAlgorithm::Md5 => self.md5.clone().finalize().to_vec(),
                    ChecksumAlgorithm::Sha1 => self.sha1.clone().finalize().to_vec(),
                    ChecksumAlgorithm::Sha256 => self.sha256.clone().finalize().to_vec(),
                    ChecksumAlgorithm::Sha512 => self.sha512.clone().finalize().to_vec(),
                }))
            };
            out.insert(algo, result);
        }
        out
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to String never fails");
    }
    out
}

/// Extracts the hex digest from a checksum sidecar body. Maven sidecars
/// contain either just the hash, or `hash  filename`.
pub fn extract_hash(content: &str) -> String {
    content.split_whitespace().next().unwrap_or("").to_string()
}

/// Applies a [`ChecksumPolicy`] to a computed-vs-expected digest pair.
pub fn verify(
    policy: ChecksumPolicy,
    algorithm: ChecksumAlgorithm,
    expected: &str,
    actual: &str,
    url: &str,
) -> miette::Result<()> {
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    match policy {
        ChecksumPolicy::Ignore => Ok(()),
        ChecksumPolicy::Warn => {
            tracing::warn!("{} mismatch for {url}: expected {expected}, got {actual}", algorithm.name());
            Ok(())
        }
        ChecksumPolicy::Fail => Err(AetherError::ChecksumFailure {
            url: url.to_string(),
            algorithm: algorithm.name().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_matches_reference_hash() {
        let mut calc = ChecksumCalculator::new(&[ChecksumAlgorithm::Sha256]);
        calc.update(b"hello world");
        let digests = calc.get();
        assert_eq!(
            digests[&ChecksumAlgorithm::Sha256].as_ref().unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn unconfigured_algorithm_is_error() {
        let calc = ChecksumCalculator::new(&[ChecksumAlgorithm::Sha256]);
        let digests = calc.get();
        assert!(digests[&ChecksumAlgorithm::Md5].is_err());
    }

    #[test]
    fn resume_without_replay_is_invalid() {
        let mut calc = ChecksumCalculator::new(&[ChecksumAlgorithm::Sha256]);
        calc.init(1024);
        calc.update(b"tail bytes only");
        let digests = calc.get();
        assert!(digests[&ChecksumAlgorithm::Sha256].is_err());
    }

    #[test]
    fn resume_with_full_replay_is_valid() {
        let mut calc = ChecksumCalculator::new(&[ChecksumAlgorithm::Sha256]);
        calc.init(5);
        calc.feed_replay(b"hello");
        calc.update(b" world");
        let digests = calc.get();
        assert_eq!(
            digests[&ChecksumAlgorithm::Sha256].as_ref().unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn extract_hash_strips_filename() {
        assert_eq!(extract_hash("abc123  my-lib-1.0.jar\n"), "abc123");
    }

    #[test]
    fn verify_fail_policy_errors_on_mismatch() {
        let err = verify(ChecksumPolicy::Fail, ChecksumAlgorithm::Sha1, "aaa", "bbb", "http://x/y.jar");
        assert!(err.is_err());
    }

    #[test]
    fn verify_warn_policy_succeeds_on_mismatch() {
        let ok = verify(ChecksumPolicy::Warn, ChecksumAlgorithm::Sha1, "aaa", "bbb", "http://x/y.jar");
        assert!(ok.is_ok());
    }
}
