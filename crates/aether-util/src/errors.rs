//! Unified error taxonomy for the Aether dependency resolver.
//!
//! Every public fallible operation across the workspace returns
//! [`AetherResult<T>`]. Variants carry the coordinate/repository/cause
//! fields needed to render a useful message without the caller having to
//! reassemble context after the fact.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AetherError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed coordinate, version, range, or configuration value.
    /// Never retried.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Remote returned 404, or the local path is absent.
    #[error("could not resolve {coordinate} from {repo_id} ({url}): not found")]
    NotFound {
        coordinate: String,
        repo_id: String,
        url: String,
    },

    /// Transient transport failure. Retried with backoff before surfacing.
    #[error("could not resolve {coordinate} from {repo_id} ({url}): {cause}")]
    TransferError {
        coordinate: String,
        repo_id: String,
        url: String,
        cause: String,
    },

    /// Checksum mismatch; kept distinct from `TransferError` since checksum
    /// policy (FAIL/WARN/IGNORE) treats it differently.
    #[error("checksum mismatch for {url} ({algorithm}): expected {expected}, got {actual}")]
    ChecksumFailure {
        url: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// No versions in range, or versioning metadata was unfetchable.
    #[error("version range resolution failed for {coordinate}: {message}")]
    VersionRangeResolution { coordinate: String, message: String },

    /// Malformed or unresolvable artifact descriptor (parent chain,
    /// property interpolation, relocation target).
    #[error("artifact descriptor error for {coordinate}: {message}")]
    ArtifactDescriptor { coordinate: String, message: String },

    /// Conflict resolver could not satisfy the intersected range for a
    /// conflict group.
    #[error("unsolvable version conflict for {group}:{artifact}: {detail}")]
    UnsolvableVersionConflict {
        group: String,
        artifact: String,
        detail: String,
    },

    /// A relocation chain revisited a coordinate it had already followed.
    #[error("circular relocation detected while resolving {coordinate}: {chain}")]
    CircularRelocation { coordinate: String, chain: String },

    /// Same holder attempted to upgrade a shared lock to exclusive.
    #[error("lock upgrade not supported: {key} is already held shared by this holder")]
    LockUpgradeNotSupported { key: String },

    /// A bounded wait (partial-file lock, sync-context lock, descriptor
    /// fetch dedup) expired.
    #[error("timed out waiting on {what} after {millis}ms")]
    Timeout { what: String, millis: u64 },

    #[error("{message}")]
    Generic { message: String },
}

pub type AetherResult<T> = miette::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_format() {
        let err = AetherError::NotFound {
            coordinate: "org.example:lib:1.0".into(),
            repo_id: "central".into(),
            url: "https://repo.example.com/org/example/lib/1.0/lib-1.0.jar".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("org.example:lib:1.0"));
        assert!(msg.contains("central"));
        assert!(msg.ends_with("not found"));
    }

    #[test]
    fn transfer_error_carries_cause() {
        let err = AetherError::TransferError {
            coordinate: "org.example:lib:1.0".into(),
            repo_id: "central".into(),
            url: "https://repo.example.com/x".into(),
            cause: "connection reset".into(),
        };
        assert!(err.to_string().ends_with("connection reset"));
    }

    #[test]
    fn checksum_failure_is_distinct_from_transfer_error() {
        let err = AetherError::ChecksumFailure {
            url: "https://repo.example.com/x.jar".into(),
            algorithm: "SHA-1".into(),
            expected: "abc".into(),
            actual: "def".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SHA-1"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("def"));
    }
}
