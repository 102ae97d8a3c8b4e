//! Version range resolution (§4.F): fetch versioning metadata from every
//! candidate repository, union the version lists, filter by range and
//! session `VersionFilter`, and return the surviving versions in
//! ascending order alongside the repository each came from.

use std::collections::BTreeMap;

use aether_core::coordinate::Coordinate;
use aether_core::range::VersionRange;
use aether_core::session::Session;
use aether_core::version::Version;
use aether_transport::layout;
use aether_transport::repository::RemoteRepository;
use aether_transport::transport::{Context, Location, Sink, Transport};
use aether_util::errors::AetherError;

use crate::metadata_xml::parse_metadata;

/// The result of resolving a version range: every matching version in
/// ascending order, plus which repository first offered each one.
#[derive(Debug, Clone)]
pub struct VersionRangeResult {
    pub versions: Vec<Version>,
    pub repository_of: BTreeMap<String, String>,
}

/// Resolve `coord.version` (expected to be a range like `[1.0,2.0)`)
/// against `repositories`, in priority order, via `transports` (one
/// transport per repository, same index).
pub async fn resolve_version_range(
    session: &Session,
    coord: &Coordinate,
    repositories: &[RemoteRepository],
    transports: &[Transport],
) -> miette::Result<VersionRangeResult> {
    let range = VersionRange::parse(&coord.version).map_err(|_| {
        AetherError::VersionRangeResolution {
            coordinate: coord.to_string(),
            message: format!("'{}' is not a version range", coord.version),
        }
    })?;

    let mut repository_of: BTreeMap<String, String> = BTreeMap::new();
    let mut seen: BTreeMap<String, Version> = BTreeMap::new();
    let cx = Context::new();

    for (repo, transport) in repositories.iter().zip(transports.iter()) {
        let path = layout::metadata_path(&coord.group, &coord.artifact);
        let loc = Location(path);
        let mut buf = Vec::new();
        let fetch = transport.get(&loc, Sink::Memory(&mut buf), 0, &cx).await;
        let Ok(_) = fetch else { continue };
        let Ok(xml) = String::from_utf8(buf) else { continue };
        let Ok(meta) = parse_metadata(&xml) else { continue };

        for raw in meta.versions {
            seen.entry(raw.clone()).or_insert_with(|| Version::parse(&raw));
            repository_of.entry(raw).or_insert_with(|| repo.id.clone());
        }
    }

    if seen.is_empty() {
        return Err(AetherError::VersionRangeResolution {
            coordinate: coord.to_string(),
            message: "no versioning metadata could be fetched from any repository".to_string(),
        }
        .into());
    }

    let mut matching: Vec<Version> = seen
        .into_values()
        .filter(|v| range.contains(v))
        .filter(|v| session.version_filter.accept(v))
        .collect();
    matching.sort();

    if matching.is_empty() {
        return Err(AetherError::VersionRangeResolution {
            coordinate: coord.to_string(),
            message: format!("no versions in range {} matched by active filter", coord.version),
        }
        .into());
    }

    repository_of.retain(|v, _| matching.iter().any(|m| m.original == *v));

    Ok(VersionRangeResult {
        versions: matching,
        repository_of,
    })
}
