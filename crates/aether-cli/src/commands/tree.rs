//! Handler for `aether tree`: print the resolved dependency tree.

use std::collections::HashSet;

use miette::Result;
use petgraph::graph::NodeIndex;
use petgraph::Direction;

use aether_resolver::arena::DependencyGraph;
use aether_util::errors::AetherError;

use crate::manifest::Manifest;
use crate::pipeline::Pipeline;

pub async fn exec(duplicates: bool) -> Result<()> {
    let project_root = std::env::current_dir().map_err(AetherError::Io)?;
    let manifest_path = project_root.join("Kargo.toml");
    if !manifest_path.is_file() {
        return Err(AetherError::InvalidInput {
            message: "no Kargo.toml found in current directory".to_string(),
        }
        .into());
    }

    let manifest = Manifest::load(&manifest_path)?;
    let pipeline = Pipeline::from_manifest(&manifest, &project_root.join(".aether-local-repo"))?;
    let (resolution, _errors) = pipeline.resolve(false).await?;

    let mut visiting = HashSet::new();
    print_node(&resolution.graph, resolution.root, 0, &mut visiting);

    if duplicates {
        for idx in resolution.graph.node_indices() {
            let node = &resolution.graph[idx];
            if !node.aliases.is_empty() {
                println!(
                    "duplicate: {} superseded {} other version(s)",
                    node.coordinate,
                    node.aliases.len()
                );
            }
        }
    }

    Ok(())
}

fn print_node(graph: &DependencyGraph, idx: NodeIndex, depth: usize, visiting: &mut HashSet<NodeIndex>) {
    let node = &graph[idx];
    println!("{}{}", "  ".repeat(depth), node.coordinate);

    if !visiting.insert(idx) {
        println!("{}  (cycle back to {})", "  ".repeat(depth), node.coordinate);
        return;
    }

    for child in graph.neighbors_directed(idx, Direction::Outgoing) {
        print_node(graph, child, depth + 1, visiting);
    }
    visiting.remove(&idx);
}
