//! Arena-backed dependency graph (§9 design note): `petgraph` with
//! integer node indices rather than `Rc`-linked nodes, so cycles in the
//! dependency graph never become reference cycles in memory.

use aether_core::coordinate::Coordinate;
use aether_core::dependency::{Exclusion, Scope};
use aether_transport::repository::RemoteRepository;
use petgraph::graph::DiGraph;

/// Node construction state per §4.G's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    /// Descriptor fetched and version-ranged but children not yet attached.
    Expanding,
    /// Children fully attached.
    Expanded,
    /// No descriptor could be resolved; terminal leaf.
    Stub,
    /// Coordinate identity already on the ancestor stack; truncated.
    Cyclic,
}

/// One node in the raw (pre-conflict-resolution) dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,

    /// Pre-management values, restored onto the result by conflict
    /// resolution phase 7 (§4.H).
    pub original_version: Option<String>,
    pub original_scope: Scope,
    pub original_optional: bool,

    /// Repositories this subtree declared on top of its parent's.
    pub repositories: Vec<RemoteRepository>,
    /// Relocation chain (oldest first) or, after conflict resolution,
    /// pruned losers kept for diagnostics.
    pub aliases: Vec<Coordinate>,
    pub state: NodeState,
    /// For `Cyclic` nodes: the ancestor coordinate this one truncates to.
    pub cycle_target: Option<Coordinate>,
}

impl GraphNode {
    pub fn root(coordinate: Coordinate, repositories: Vec<RemoteRepository>) -> Self {
        Self {
            coordinate,
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
            original_version: None,
            original_scope: Scope::Compile,
            original_optional: false,
            repositories,
            aliases: Vec::new(),
            state: NodeState::Expanding,
            cycle_target: None,
        }
    }
}

pub type DependencyGraph = DiGraph<GraphNode, ()>;

pub fn node_identity(coord: &Coordinate) -> String {
    coord.identity_key()
}
