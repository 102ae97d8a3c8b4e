//! Handler for `aether fetch`: resolve conflicts, then download every
//! resolved artifact into the local repository.

use std::time::Duration;

use miette::Result;

use aether_metadata::descriptor::{resolve_snapshot_filename, RepoHandle};
use aether_transport::checksum::ChecksumPolicy;
use aether_transport::connector::{GetTask, RepositoryConnector};
use aether_transport::transport::Location;
use aether_util::errors::AetherError;

use crate::manifest::Manifest;
use crate::pipeline::Pipeline;

pub async fn exec(verbose: bool, verify: bool) -> Result<()> {
    let project_root = std::env::current_dir().map_err(AetherError::Io)?;
    let manifest_path = project_root.join("Kargo.toml");
    if !manifest_path.is_file() {
        return Err(AetherError::InvalidInput {
            message: "no Kargo.toml found in current directory".to_string(),
        }
        .into());
    }

    let manifest = Manifest::load(&manifest_path)?;
    let local_repo = project_root.join(".aether-local-repo");
    let pipeline = Pipeline::from_manifest(&manifest, &local_repo)?;
    let (resolution, _errors) = pipeline.resolve(false).await?;

    let policy = if verify { ChecksumPolicy::Fail } else { ChecksumPolicy::Ignore };
    let Some(repo) = pipeline.repos.first() else {
        return Err(AetherError::InvalidInput {
            message: "no repositories configured".to_string(),
        }
        .into());
    };
    let connector = RepositoryConnector::new(repo.transport.clone(), 4, policy, Duration::from_secs(60));
    let handles: Vec<RepoHandle> = pipeline
        .repos
        .iter()
        .map(|r| RepoHandle { repository: &r.repository, transport: &r.transport })
        .collect();

    let mut fetched = 0u32;
    for idx in resolution.graph.node_indices() {
        if idx == resolution.root {
            continue;
        }
        let node = &resolution.graph[idx];
        let resolved_version = resolve_snapshot_filename(&node.coordinate, &handles).await;
        let path = aether_transport::layout::artifact_path(&node.coordinate, &resolved_version);
        let destination = local_repo.join(&path);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(AetherError::Io)?;
        }
        let task = GetTask {
            location: Location(path),
            destination,
            expected_checksums: Vec::new(),
        };

        let results = connector.get(vec![task]).await;
        match &results[0] {
            Ok(bytes) => {
                fetched += 1;
                if verbose {
                    println!("fetched {} ({bytes} bytes)", node.coordinate);
                }
            }
            Err(e) => eprintln!("warning: failed to fetch {}: {e}", node.coordinate),
        }
    }

    println!("fetched {fetched} artifact(s)");
    Ok(())
}
