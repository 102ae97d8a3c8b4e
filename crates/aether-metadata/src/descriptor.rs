//! Artifact descriptor reader (§4.E): fetch + parse a descriptor,
//! follow relocation chains, apply parent inheritance and BOM imports,
//! and cache the result (including negative "no descriptor" entries)
//! for the lifetime of a session.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use aether_core::coordinate::Coordinate;
use aether_core::dependency::{Dependency, Exclusion, Scope};
use aether_core::session::Session;
use aether_transport::layout;
use aether_transport::repository::RemoteRepository;
use aether_transport::transport::{Context, Location, Sink, Transport};
use aether_util::errors::AetherError;

use crate::metadata_xml::parse_snapshot_metadata;
use crate::pom::{parse_pom, Pom, PomDependency};

/// `(effective-coord, direct-deps, managed-deps, declared-repos, aliases,
/// relocation-chain)` per §4.E step 4.
#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    pub coordinate: Coordinate,
    pub dependencies: Vec<Dependency>,
    pub managed_dependencies: Vec<Dependency>,
    pub declared_repositories: Vec<RemoteRepository>,
    /// Coordinates this descriptor was reached through before landing on
    /// `coordinate` (the relocation chain, oldest first).
    pub aliases: Vec<Coordinate>,
}

/// A repository plus the transport already built for it, so the reader
/// doesn't need to know how transports are constructed.
pub struct RepoHandle<'a> {
    pub repository: &'a RemoteRepository,
    pub transport: &'a Transport,
}

#[derive(Clone)]
enum CacheEntry {
    Found(ArtifactDescriptor),
    NoDescriptor,
}

/// Session-scoped descriptor cache keyed by `(coordinate identity,
/// repository fingerprint)`. A `NoDescriptor` entry short-circuits
/// repeated failed attempts within the same session (§4.E).
#[derive(Default)]
pub struct DescriptorCache {
    entries: Mutex<BTreeMap<(String, String), CacheEntry>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(coord: &Coordinate, repos: &[RepoHandle<'_>]) -> (String, String) {
        let fingerprint = repos.iter().map(|r| r.repository.id.as_str()).collect::<Vec<_>>().join(",");
        (coord.identity_key(), fingerprint)
    }

    pub fn is_no_descriptor(&self, coord: &Coordinate, repos: &[RepoHandle<'_>]) -> bool {
        let key = Self::key(coord, repos);
        matches!(self.entries.lock().unwrap().get(&key), Some(CacheEntry::NoDescriptor))
    }
}

/// Read the descriptor for `coord`, following relocation chains until a
/// terminal coordinate is reached, per §4.E steps 1-4.
pub async fn resolve_descriptor(
    session: &Session,
    cache: &DescriptorCache,
    coord: &Coordinate,
    repos: &[RepoHandle<'_>],
) -> miette::Result<ArtifactDescriptor> {
    let cache_key = DescriptorCache::key(coord, repos);
    if let Some(entry) = cache.entries.lock().unwrap().get(&cache_key).cloned() {
        return match entry {
            CacheEntry::Found(desc) => Ok(desc),
            CacheEntry::NoDescriptor => Err(AetherError::ArtifactDescriptor {
                coordinate: coord.to_string(),
                message: "negative-cached: descriptor previously unresolvable".to_string(),
            }
            .into()),
        };
    }

    let result = resolve_descriptor_uncached(session, coord, repos).await;

    let mut entries = cache.entries.lock().unwrap();
    match &result {
        Ok(desc) => {
            entries.insert(cache_key, CacheEntry::Found(desc.clone()));
        }
        Err(_) => {
            entries.insert(cache_key, CacheEntry::NoDescriptor);
        }
    }
    result
}

async fn resolve_descriptor_uncached(
    _session: &Session,
    coord: &Coordinate,
    repos: &[RepoHandle<'_>],
) -> miette::Result<ArtifactDescriptor> {
    let mut current = coord.clone();
    let mut chain: Vec<Coordinate> = Vec::new();

    loop {
        if chain.iter().any(|c| c.identity_key() == current.identity_key() && c.version == current.version) {
            return Err(AetherError::CircularRelocation {
                coordinate: coord.to_string(),
                chain: chain
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> "),
            }
            .into());
        }

        let pom = fetch_pom(&current, repos).await?;
        let pom = apply_parent_chain(pom, repos).await?;

        if let Some(reloc) = &pom.relocation {
            chain.push(current.clone());
            current = Coordinate {
                group: reloc.group_id.clone().unwrap_or_else(|| current.group.clone()),
                artifact: reloc.artifact_id.clone().unwrap_or_else(|| current.artifact.clone()),
                extension: current.extension.clone(),
                classifier: current.classifier.clone(),
                version: reloc.version.clone().unwrap_or_else(|| current.version.clone()),
            };
            continue;
        }

        let mut pom = pom;
        pom.resolve_properties();

        let dependencies = pom
            .dependencies
            .iter()
            .map(|d| pom_dep_to_dependency(d, &pom))
            .collect::<miette::Result<Vec<_>>>()?;
        let managed_dependencies = resolve_managed_dependencies(&pom, repos, 0).await?;

        let declared_repositories = pom
            .repositories
            .iter()
            .filter_map(|r| RemoteRepository::new(r.id.clone(), r.url.clone()).ok())
            .collect();

        return Ok(ArtifactDescriptor {
            coordinate: current,
            dependencies,
            managed_dependencies,
            declared_repositories,
            aliases: chain,
        });
    }
}

/// Apply the parent chain (§SPEC_FULL supplement: parent POM
/// inheritance) by walking `parent` refs until none remain.
async fn apply_parent_chain<'a>(mut pom: Pom, repos: &[RepoHandle<'a>]) -> miette::Result<Pom> {
    let mut visited = 0;
    while let Some(parent_ref) = pom.parent.clone() {
        visited += 1;
        if visited > 32 {
            return Err(AetherError::ArtifactDescriptor {
                coordinate: format!("{}:{}", parent_ref.group_id, parent_ref.artifact_id),
                message: "parent chain exceeded depth bound (32); likely cyclic".to_string(),
            }
            .into());
        }
        let parent_coord = Coordinate::new(parent_ref.group_id, parent_ref.artifact_id, parent_ref.version)
            .with_extension("pom");
        let parent_pom = fetch_pom(&parent_coord, repos).await?;
        pom.apply_parent(&parent_pom);
        pom.parent = parent_pom.parent;
    }
    Ok(pom)
}

/// Resolve the filename a `-SNAPSHOT` coordinate's descriptor actually
/// lives under, per §4.F: fetch the version-level `maven-metadata.xml`
/// and extract its timestamp/build-number. Falls back to the declared
/// version (non-snapshot, or no metadata published) rather than failing
/// the whole descriptor fetch.
pub async fn resolve_snapshot_filename(coord: &Coordinate, repos: &[RepoHandle<'_>]) -> String {
    if !coord.version.ends_with("-SNAPSHOT") {
        return coord.version.clone();
    }
    let path = layout::snapshot_metadata_path(&coord.group, &coord.artifact, &coord.version);
    let cx = Context::new();
    for handle in repos {
        let loc = Location(path.clone());
        let mut buf = Vec::new();
        if handle.transport.get(&loc, Sink::Memory(&mut buf), 0, &cx).await.is_ok() {
            if let Ok(xml) = String::from_utf8(buf) {
                if let Ok(meta) = parse_snapshot_metadata(&xml) {
                    return meta.snapshot_base(&coord.artifact);
                }
            }
        }
    }
    coord.version.clone()
}

async fn fetch_pom(coord: &Coordinate, repos: &[RepoHandle<'_>]) -> miette::Result<Pom> {
    let resolved_version = resolve_snapshot_filename(coord, repos).await;
    let path = layout::artifact_path(&coord.clone().with_extension("pom"), &resolved_version);
    let cx = Context::new();

    let mut last_err = None;
    for handle in repos {
        let loc = Location(path.clone());
        let mut buf = Vec::new();
        match handle.transport.get(&loc, Sink::Memory(&mut buf), 0, &cx).await {
            Ok(_) => {
                let xml = String::from_utf8(buf).map_err(|e| AetherError::ArtifactDescriptor {
                    coordinate: coord.to_string(),
                    message: format!("descriptor is not valid UTF-8: {e}"),
                })?;
                return parse_pom(&xml);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        AetherError::NotFound {
            coordinate: coord.to_string(),
            repo_id: "<none>".to_string(),
            url: path.clone(),
        }
        .into()
    }))
}

fn pom_dep_to_dependency(d: &PomDependency, pom: &Pom) -> miette::Result<Dependency> {
    let version = d
        .version
        .as_ref()
        .map(|v| pom.interpolate(v))
        .ok_or_else(|| AetherError::ArtifactDescriptor {
            coordinate: format!("{}:{}", d.group_id, d.artifact_id),
            message: "dependency declared without a version".to_string(),
        })?;

    let mut coord = Coordinate::new(d.group_id.clone(), d.artifact_id.clone(), version);
    if let Some(classifier) = &d.classifier {
        coord = coord.with_classifier(classifier.clone());
    }
    if let Some(type_) = &d.type_ {
        coord = coord.with_extension(type_.clone());
    }

    let scope = d
        .scope
        .as_deref()
        .and_then(Scope::parse)
        .unwrap_or(Scope::Compile);

    Ok(Dependency {
        coordinate: coord,
        scope,
        optional: d.optional,
        exclusions: d
            .exclusions
            .iter()
            .map(|e| Exclusion {
                group: e.group_id.clone(),
                artifact: e.artifact_id.clone(),
            })
            .collect(),
        system_path: d.system_path.as_ref().map(|p| pom.interpolate(p).into()),
    })
}

/// BOM imports: `dependencyManagement` entries with `scope=import,
/// type=pom` (§SPEC_FULL supplement). Fetches each imported BOM's POM,
/// recursively resolves its own `dependencyManagement` (including
/// further nested imports), and splices the resulting entries in place
/// of the import declaration itself.
fn resolve_managed_dependencies<'a>(
    pom: &'a Pom,
    repos: &'a [RepoHandle<'a>],
    depth: u32,
) -> Pin<Box<dyn Future<Output = miette::Result<Vec<Dependency>>> + Send + 'a>> {
    Box::pin(async move {
        if depth > 16 {
            return Err(AetherError::ArtifactDescriptor {
                coordinate: "<bom import>".to_string(),
                message: "BOM import chain exceeded depth bound (16); likely cyclic".to_string(),
            }
            .into());
        }

        let mut result = Vec::new();
        for d in &pom.dependency_management {
            let is_import = d.scope.as_deref() == Some("import") && d.type_.as_deref().unwrap_or("jar") == "pom";
            if !is_import {
                result.push(pom_dep_to_dependency(d, pom)?);
                continue;
            }

            let version = d
                .version
                .as_ref()
                .map(|v| pom.interpolate(v))
                .ok_or_else(|| AetherError::ArtifactDescriptor {
                    coordinate: format!("{}:{}", d.group_id, d.artifact_id),
                    message: "BOM import declared without a version".to_string(),
                })?;
            let bom_coord = Coordinate::new(d.group_id.clone(), d.artifact_id.clone(), version).with_extension("pom");

            let mut bom_pom = fetch_pom(&bom_coord, repos).await?;
            bom_pom.resolve_properties();
            let nested = resolve_managed_dependencies(&bom_pom, repos, depth + 1).await?;
            result.extend(nested);
        }
        Ok(result)
    })
}
