//! Shared collect -> resolve-conflicts plumbing used by every command.

use aether_core::coordinate::Coordinate;
use aether_core::session::Session;
use aether_resolver::arena::DependencyGraph;
use aether_resolver::collector::{self, ResolvedRepo};
use aether_resolver::conflict::{self, ConflictResolution};
use aether_transport::auth::Credentials;
use aether_transport::connector::build_transport;
use aether_transport::repository::RemoteRepository;
use aether_util::errors::AetherError;
use petgraph::graph::NodeIndex;

use crate::manifest::Manifest;

pub struct Pipeline {
    pub session: Session,
    pub root: Coordinate,
    pub repos: Vec<ResolvedRepo>,
}

impl Pipeline {
    pub fn from_manifest(manifest: &Manifest, local_repository: &std::path::Path) -> miette::Result<Self> {
        if manifest.repositories.is_empty() {
            return Err(AetherError::InvalidInput {
                message: "manifest declares no [repositories]".to_string(),
            }
            .into());
        }

        let session = Session::new(local_repository);
        let mut repos = Vec::new();
        for (id, url) in &manifest.repositories {
            let repository = RemoteRepository::new(id.clone(), url.clone())?;
            let transport = build_transport(&repository, &session.config.connector, Credentials::default())?;
            repos.push(ResolvedRepo::new(repository, transport));
        }

        Ok(Self {
            session,
            root: manifest.root_coordinate(),
            repos,
        })
    }

    pub async fn collect(&self) -> miette::Result<(DependencyGraph, NodeIndex, Vec<collector::CollectionError>)> {
        let result = collector::collect(&self.session, &self.root, self.repos.clone()).await?;
        Ok((result.graph, result.root, result.errors))
    }

    pub async fn resolve(&self, convergent: bool) -> miette::Result<(ConflictResolution, Vec<collector::CollectionError>)> {
        let (graph, root, errors) = self.collect().await?;
        let resolution = if convergent {
            conflict::resolve_convergent(&graph, root)?
        } else {
            conflict::resolve(&graph, root)?
        };
        Ok((resolution, errors))
    }
}
