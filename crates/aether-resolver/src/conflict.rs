//! Conflict resolver (§4.H): a post-order transform over the raw
//! (pre-conflict) dependency graph that collapses each conflict group
//! (nodes sharing a coordinate identity) down to a single winner.
//!
//! The raw graph built by [`crate::collector`] is always a tree — every
//! occurrence of a dependency gets its own node, even a cyclic one — so
//! "discovery order" for the nearest-wins tie-break is simply ascending
//! `NodeIndex`, since nodes are inserted in declaration-order DFS
//! pre-order (§9 open question: tie-break order of discovery).

use std::collections::{HashMap, HashSet};

use aether_core::dependency::Scope;
use aether_core::range::VersionRange;
use aether_core::selector::VersionConstraint;
use aether_core::version::Version;
use aether_util::errors::AetherError;
use petgraph::graph::NodeIndex;
use petgraph::Direction;

use crate::arena::{node_identity, DependencyGraph, GraphNode};

#[derive(Debug)]
pub struct ConflictResolution {
    pub graph: DependencyGraph,
    pub root: NodeIndex,
}

struct Group {
    members: Vec<NodeIndex>,
    winner: NodeIndex,
}

fn scope_rank(scope: Scope) -> u8 {
    match scope {
        Scope::Compile => 0,
        Scope::Runtime => 1,
        Scope::Provided => 2,
        Scope::Test => 3,
        Scope::System | Scope::CompileOnly | Scope::TestRuntime | Scope::TestOnly => 4,
        Scope::None => 5,
    }
}

fn declared_constraint(node: &GraphNode) -> VersionConstraint {
    match &node.original_version {
        Some(v) if VersionRange::looks_like_range(v) => match VersionRange::parse(v) {
            Ok(range) => VersionConstraint::from_range(range),
            Err(_) => VersionConstraint::unconstrained(),
        },
        _ => VersionConstraint::unconstrained(),
    }
}

/// Depth of every reachable node from `root`, measured along the unique
/// tree path (the raw graph has no real cycles; truncated dependencies
/// are distinct terminal nodes).
fn compute_depths(raw: &DependencyGraph, root: NodeIndex) -> HashMap<NodeIndex, u32> {
    let mut depths = HashMap::new();
    let mut stack = vec![(root, 0u32)];
    while let Some((idx, depth)) = stack.pop() {
        depths.insert(idx, depth);
        for child in raw.neighbors_directed(idx, Direction::Outgoing) {
            stack.push((child, depth + 1));
        }
    }
    depths
}

/// Phases 1-2: assign conflict-group IDs and pick a nearest-wins winner
/// per group, validating the winner against the intersected constraint.
fn build_groups(raw: &DependencyGraph, root: NodeIndex, depths: &HashMap<NodeIndex, u32>) -> miette::Result<HashMap<String, Group>> {
    let mut by_identity: HashMap<String, Vec<NodeIndex>> = HashMap::new();
    for idx in raw.node_indices() {
        if idx == root {
            continue;
        }
        by_identity
            .entry(node_identity(&raw[idx].coordinate))
            .or_default()
            .push(idx);
    }

    let mut groups = HashMap::new();
    for (identity, mut members) in by_identity {
        members.sort_by_key(|idx| (depths.get(idx).copied().unwrap_or(u32::MAX), idx.index()));
        let winner = members[0];

        let mut constraint = VersionConstraint::unconstrained();
        for &member in &members {
            let member_constraint = declared_constraint(&raw[member]);
            constraint = constraint.intersect(&member_constraint).ok_or_else(|| {
                AetherError::UnsolvableVersionConflict {
                    group: raw[winner].coordinate.group.clone(),
                    artifact: raw[winner].coordinate.artifact.clone(),
                    detail: format!(
                        "no version satisfies every declared constraint among: {}",
                        members.iter().map(|m| raw[*m].coordinate.to_string()).collect::<Vec<_>>().join(", ")
                    ),
                }
            })?;
        }

        let winner_version = Version::parse(&raw[winner].coordinate.version);
        if !constraint.satisfied_by(&winner_version) {
            return Err(AetherError::UnsolvableVersionConflict {
                group: raw[winner].coordinate.group.clone(),
                artifact: raw[winner].coordinate.artifact.clone(),
                detail: format!(
                    "nearest-wins candidate {} does not satisfy the intersected constraint from: {}",
                    raw[winner].coordinate,
                    members.iter().map(|m| raw[*m].coordinate.to_string()).collect::<Vec<_>>().join(", ")
                ),
            }
            .into());
        }

        groups.insert(identity, Group { members, winner });
    }

    Ok(groups)
}

fn effective_scope(raw: &DependencyGraph, group: &Group, depths: &HashMap<NodeIndex, u32>) -> Scope {
    let winner_depth = depths.get(&group.winner).copied().unwrap_or(0);
    group
        .members
        .iter()
        .filter(|idx| depths.get(idx).copied().unwrap_or(u32::MAX) == winner_depth)
        .map(|idx| raw[*idx].scope)
        .min_by_key(|s| scope_rank(*s))
        .unwrap_or(raw[group.winner].scope)
}

fn effective_optional(raw: &DependencyGraph, group: &Group) -> bool {
    group.members.iter().all(|idx| raw[*idx].optional)
}

/// Run the default nearest-wins conflict resolution (§4.H phases 1-7).
pub fn resolve(raw: &DependencyGraph, root: NodeIndex) -> miette::Result<ConflictResolution> {
    let depths = compute_depths(raw, root);
    let groups = build_groups(raw, root, &depths)?;
    Ok(materialize(raw, root, groups, &depths))
}

/// The convergence-enforcing variant: any conflict group with more than
/// one distinct resolved version is fatal, listing every contributing
/// path, even when nearest-wins would otherwise have satisfied all
/// constraints.
pub fn resolve_convergent(raw: &DependencyGraph, root: NodeIndex) -> miette::Result<ConflictResolution> {
    let depths = compute_depths(raw, root);
    let groups = build_groups(raw, root, &depths)?;

    for group in groups.values() {
        let mut versions: Vec<&str> = group.members.iter().map(|idx| raw[*idx].coordinate.version.as_str()).collect();
        versions.sort_unstable();
        versions.dedup();
        if versions.len() > 1 {
            let winner = &raw[group.winner];
            return Err(AetherError::UnsolvableVersionConflict {
                group: winner.coordinate.group.clone(),
                artifact: winner.coordinate.artifact.clone(),
                detail: format!(
                    "convergence required but {} distinct versions were requested via: {}",
                    versions.len(),
                    group
                        .members
                        .iter()
                        .map(|idx| raw[*idx].coordinate.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }
            .into());
        }
    }

    Ok(materialize(raw, root, groups, &depths))
}

/// Phases 3-7: build the pruned output graph from the winner selection.
fn materialize(
    raw: &DependencyGraph,
    root: NodeIndex,
    groups: HashMap<String, Group>,
    depths: &HashMap<NodeIndex, u32>,
) -> ConflictResolution {
    let mut output = DependencyGraph::new();
    let mut remap: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    let root_node = raw[root].clone();
    let output_root = output.add_node(root_node);
    remap.insert(root, output_root);

    for group in groups.values() {
        let scope = effective_scope(raw, group, depths);
        let optional = effective_optional(raw, group);

        let mut node = raw[group.winner].clone();
        node.scope = scope;
        node.optional = optional;
        for &loser in &group.members {
            if loser != group.winner {
                node.aliases.push(raw[loser].coordinate.clone());
            }
        }

        let output_idx = output.add_node(node);
        for &member in &group.members {
            remap.insert(member, output_idx);
        }
    }

    let mut seen_edges: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    for edge in raw.raw_edges() {
        let parent = remap[&edge.source()];
        let child = remap[&edge.target()];
        if seen_edges.insert((parent, child)) {
            output.add_edge(parent, child, ());
        }
    }

    ConflictResolution { graph: output, root: output_root }
}
