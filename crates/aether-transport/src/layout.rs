//! Repository layout (§6): maps a coordinate to the relative path a
//! transport resolves against its base, mirroring standard Maven2
//! layout (`g/a/v/a-v[-c].e`, dots in the group replaced by slashes).

use aether_core::coordinate::Coordinate;
use aether_util::hash::ChecksumAlgorithm;

/// Path to a coordinate's artifact file, using `resolved_version` (which
/// may be a timestamped snapshot filename rather than `coord.version`).
pub fn artifact_path(coord: &Coordinate, resolved_version: &str) -> String {
    let group_path = coord.group.replace('.', "/");
    let filename = if coord.classifier.is_empty() {
        format!("{}-{}.{}", coord.artifact, resolved_version, coord.extension)
    } else {
        format!(
            "{}-{}-{}.{}",
            coord.artifact, resolved_version, coord.classifier, coord.extension
        )
    };
    format!("{group_path}/{}/{}/{filename}", coord.artifact, coord.version)
}

/// Path to the artifact-level `maven-metadata.xml` (version listing).
pub fn metadata_path(group: &str, artifact: &str) -> String {
    format!("{}/{artifact}/maven-metadata.xml", group.replace('.', "/"))
}

/// Path to the version-level `maven-metadata.xml` (SNAPSHOT resolution).
pub fn snapshot_metadata_path(group: &str, artifact: &str, version: &str) -> String {
    format!(
        "{}/{artifact}/{version}/maven-metadata.xml",
        group.replace('.', "/")
    )
}

/// The checksum sidecar path for a given artifact path and algorithm.
pub fn checksum_sibling_path(artifact_path: &str, algorithm: ChecksumAlgorithm) -> String {
    format!("{artifact_path}.{}", algorithm.extension())
}
