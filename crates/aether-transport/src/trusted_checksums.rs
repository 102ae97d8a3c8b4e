//! Trusted checksums post-processor (§4.D.4): independent of per-download
//! checksum validation, re-hashes a resolved artifact file against an
//! out-of-band trusted record after the fact.

use std::path::{Path, PathBuf};

use aether_core::coordinate::Coordinate;
use aether_util::errors::AetherError;
use aether_util::hash::{hash_file_with, ChecksumAlgorithm};

use crate::layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustedChecksumsMode {
    Record,
    Verify,
}

#[derive(Debug, Clone)]
pub struct TrustedChecksumsConfig {
    pub algorithms: Vec<ChecksumAlgorithm>,
    pub fail_if_missing: bool,
    pub include_snapshots: bool,
    pub mode: TrustedChecksumsMode,
}

impl Default for TrustedChecksumsConfig {
    fn default() -> Self {
        Self {
            algorithms: vec![ChecksumAlgorithm::Sha1],
            fail_if_missing: false,
            include_snapshots: false,
            mode: TrustedChecksumsMode::Verify,
        }
    }
}

/// An out-of-band trusted checksum record, one flat file per
/// `(algorithm, repository-relative artifact path)` under a base
/// directory — the sparse-directory layout, the simplest of the two
/// styles a trusted-checksums source can take.
pub struct SparseDirectorySource {
    base_dir: PathBuf,
}

impl SparseDirectorySource {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// `resolved_version` is the filename a `-SNAPSHOT` coordinate's
    /// artifact actually lives under (timestamped build, when published),
    /// falling back to `coord.version` for non-snapshots.
    fn record_path(&self, coord: &Coordinate, resolved_version: &str, algorithm: ChecksumAlgorithm) -> PathBuf {
        let relative = layout::artifact_path(coord, resolved_version);
        self.base_dir.join(algorithm.extension()).join(relative)
    }

    pub fn read(
        &self,
        coord: &Coordinate,
        resolved_version: &str,
        algorithm: ChecksumAlgorithm,
    ) -> miette::Result<Option<String>> {
        let path = self.record_path(coord, resolved_version, algorithm);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AetherError::Io(e).into()),
        }
    }

    pub fn write(
        &self,
        coord: &Coordinate,
        resolved_version: &str,
        algorithm: ChecksumAlgorithm,
        digest: &str,
    ) -> miette::Result<()> {
        let path = self.record_path(coord, resolved_version, algorithm);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(AetherError::Io)?;
        }
        std::fs::write(&path, digest).map_err(AetherError::Io)?;
        Ok(())
    }
}

/// Re-hashes `resolved_path` and reconciles it against `source` per
/// `config`. In [`TrustedChecksumsMode::Record`] mode the computed
/// digests are written back; in [`TrustedChecksumsMode::Verify`] mode a
/// mismatch, or a missing record when `fail_if_missing` is set, clears
/// `resolved_path` and returns a [`AetherError::ChecksumFailure`].
pub fn post_process(
    source: &SparseDirectorySource,
    config: &TrustedChecksumsConfig,
    coord: &Coordinate,
    resolved_version: &str,
    resolved_path: &mut Option<PathBuf>,
) -> miette::Result<()> {
    let Some(path) = resolved_path.clone() else {
        return Ok(());
    };
    if !config.include_snapshots && coord.version.ends_with("-SNAPSHOT") {
        return Ok(());
    }

    for &algorithm in &config.algorithms {
        let computed = hash_file_with(algorithm, &path)?;
        match config.mode {
            TrustedChecksumsMode::Record => {
                source.write(coord, resolved_version, algorithm, &computed)?;
            }
            TrustedChecksumsMode::Verify => {
                verify_one(source, config, coord, resolved_version, algorithm, &computed, resolved_path, &path)?;
            }
        }
    }
    Ok(())
}

fn verify_one(
    source: &SparseDirectorySource,
    config: &TrustedChecksumsConfig,
    coord: &Coordinate,
    resolved_version: &str,
    algorithm: ChecksumAlgorithm,
    computed: &str,
    resolved_path: &mut Option<PathBuf>,
    path: &Path,
) -> miette::Result<()> {
    match source.read(coord, resolved_version, algorithm)? {
        Some(trusted) if trusted.eq_ignore_ascii_case(computed) => Ok(()),
        Some(trusted) => {
            *resolved_path = None;
            Err(AetherError::ChecksumFailure {
                url: path.display().to_string(),
                algorithm: algorithm.name().to_string(),
                expected: trusted,
                actual: computed.to_string(),
            }
            .into())
        }
        None if config.fail_if_missing => {
            *resolved_path = None;
            Err(AetherError::ChecksumFailure {
                url: path.display().to_string(),
                algorithm: algorithm.name().to_string(),
                expected: "<no trusted record>".to_string(),
                actual: computed.to_string(),
            }
            .into())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_artifact(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("lib-1.0.jar");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn record_mode_writes_the_trusted_digest() {
        let dir = tempdir().unwrap();
        let source = SparseDirectorySource::new(dir.path().join("trusted"));
        let coord = Coordinate::new("org.example", "lib", "1.0");
        let artifact = write_artifact(dir.path(), b"hello world");
        let mut resolved = Some(artifact);

        let config = TrustedChecksumsConfig {
            algorithms: vec![ChecksumAlgorithm::Sha1],
            fail_if_missing: false,
            include_snapshots: false,
            mode: TrustedChecksumsMode::Record,
        };
        post_process(&source, &config, &coord, &coord.version.clone(), &mut resolved).unwrap();
        assert!(resolved.is_some());
        assert!(source.read(&coord, &coord.version.clone(), ChecksumAlgorithm::Sha1).unwrap().is_some());
    }

    #[test]
    fn verify_mode_accepts_matching_digest() {
        let dir = tempdir().unwrap();
        let source = SparseDirectorySource::new(dir.path().join("trusted"));
        let coord = Coordinate::new("org.example", "lib", "1.0");
        let artifact = write_artifact(dir.path(), b"hello world");
        let mut resolved = Some(artifact.clone());

        let record_config = TrustedChecksumsConfig {
            mode: TrustedChecksumsMode::Record,
            ..TrustedChecksumsConfig::default()
        };
        post_process(&source, &record_config, &coord, &coord.version.clone(), &mut resolved).unwrap();

        let mut resolved2 = Some(artifact);
        post_process(&source, &TrustedChecksumsConfig::default(), &coord, &coord.version.clone(), &mut resolved2).unwrap();
        assert!(resolved2.is_some());
    }

    #[test]
    fn verify_mode_clears_resolved_path_on_mismatch() {
        let dir = tempdir().unwrap();
        let source = SparseDirectorySource::new(dir.path().join("trusted"));
        let coord = Coordinate::new("org.example", "lib", "1.0");
        source.write(&coord, &coord.version.clone(), ChecksumAlgorithm::Sha1, "0000000000000000000000000000000000000000").unwrap();

        let artifact = write_artifact(dir.path(), b"hello world");
        let mut resolved = Some(artifact);
        let err = post_process(&source, &TrustedChecksumsConfig::default(), &coord, &coord.version.clone(), &mut resolved).unwrap_err();
        assert!(resolved.is_none());
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn verify_mode_with_fail_if_missing_rejects_unrecorded_artifact() {
        let dir = tempdir().unwrap();
        let source = SparseDirectorySource::new(dir.path().join("trusted"));
        let coord = Coordinate::new("org.example", "lib", "1.0");
        let artifact = write_artifact(dir.path(), b"hello world");
        let mut resolved = Some(artifact);

        let config = TrustedChecksumsConfig {
            fail_if_missing: true,
            ..TrustedChecksumsConfig::default()
        };
        let err = post_process(&source, &config, &coord, &coord.version.clone(), &mut resolved).unwrap_err();
        assert!(resolved.is_none());
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn verify_mode_without_fail_if_missing_tolerates_unrecorded_artifact() {
        let dir = tempdir().unwrap();
        let source = SparseDirectorySource::new(dir.path().join("trusted"));
        let coord = Coordinate::new("org.example", "lib", "1.0");
        let artifact = write_artifact(dir.path(), b"hello world");
        let mut resolved = Some(artifact);

        post_process(&source, &TrustedChecksumsConfig::default(), &coord, &coord.version.clone(), &mut resolved).unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn snapshots_are_skipped_unless_included() {
        let dir = tempdir().unwrap();
        let source = SparseDirectorySource::new(dir.path().join("trusted"));
        let coord = Coordinate::new("org.example", "lib", "1.0-SNAPSHOT");
        let artifact = write_artifact(dir.path(), b"hello world");
        let mut resolved = Some(artifact);

        let config = TrustedChecksumsConfig {
            fail_if_missing: true,
            ..TrustedChecksumsConfig::default()
        };
        post_process(&source, &config, &coord, &coord.version.clone(), &mut resolved).unwrap();
        assert!(resolved.is_some());
    }
}
