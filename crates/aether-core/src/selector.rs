//! Dependency selector/manager/traverser/filter variants (§4.G, §9).
//!
//! Tagged variants rather than a trait-object class hierarchy, per the
//! "selector/manager/traverser polymorphism" design note: `derive(ctx)`
//! is a plain function match on the variant, which keeps the collector's
//! hot path free of dynamic dispatch. Each policy is immutable; deriving
//! a child context returns a new instance rather than mutating in place.

use crate::coordinate::Coordinate;
use crate::dependency::{Dependency, Exclusion, Scope};
use crate::range::VersionRange;

/// Decides whether a dependency edge should be followed at all.
#[derive(Debug, Clone)]
pub enum Selector {
    And(Vec<Selector>),
    Or(Vec<Selector>),
    ScopeFilter {
        include: Vec<Scope>,
        exclude: Vec<Scope>,
    },
    ExcludeOptional,
    /// Rejects any dependency matching one of the accumulated exclusion
    /// patterns. Populated per-edge from the union of ancestor exclusion
    /// sets (§3 invariant: "exclusion sets propagate").
    Exclusion(Vec<Exclusion>),
}

impl Selector {
    /// `true` if the edge to `dep` should be followed.
    pub fn accept(&self, dep: &Dependency) -> bool {
        match self {
            Selector::And(parts) => parts.iter().all(|p| p.accept(dep)),
            Selector::Or(parts) => parts.iter().any(|p| p.accept(dep)),
            Selector::ScopeFilter { include, exclude } => {
                if exclude.contains(&dep.scope) {
                    return false;
                }
                include.is_empty() || include.contains(&dep.scope)
            }
            Selector::ExcludeOptional => !dep.optional,
            Selector::Exclusion(patterns) => {
                !patterns.iter().any(|p| p.matches(&dep.coordinate))
            }
        }
    }

    /// The default selector: exclude `none`-scoped edges, keep everything
    /// else including optional dependencies (the collector decides
    /// separately whether to expand an optional edge's children).
    pub fn default_selector() -> Self {
        Selector::ScopeFilter {
            include: Vec::new(),
            exclude: vec![Scope::None],
        }
    }

    /// Derive the child context's selector: merges this selector's
    /// exclusions with any new ones declared on `dep`, per the §3
    /// invariant that effective exclusions are the union over the path.
    pub fn derive(&self, dep: &Dependency) -> Selector {
        if dep.exclusions.is_empty() {
            return self.clone();
        }
        let mut combined = self.accumulated_exclusions();
        combined.extend(dep.exclusions.iter().cloned());
        let mut parts = vec![Selector::Exclusion(combined)];
        for part in self.non_exclusion_parts() {
            parts.push(part);
        }
        Selector::And(parts)
    }

    fn accumulated_exclusions(&self) -> Vec<Exclusion> {
        match self {
            Selector::Exclusion(v) => v.clone(),
            Selector::And(parts) => parts.iter().flat_map(Selector::accumulated_exclusions).collect(),
            _ => Vec::new(),
        }
    }

    fn non_exclusion_parts(&self) -> Vec<Selector> {
        match self {
            Selector::Exclusion(_) => Vec::new(),
            Selector::And(parts) => parts
                .iter()
                .filter(|p| !matches!(p, Selector::Exclusion(_)))
                .cloned()
                .collect(),
            other => vec![other.clone()],
        }
    }
}

/// A single `dependencyManagement`-style override: matches dependencies
/// by artifact identity and overrides version/scope/exclusions/optional
/// when present.
#[derive(Debug, Clone)]
pub struct ManagedDependency {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
    pub scope: Option<Scope>,
    pub exclusions: Vec<Exclusion>,
    pub optional: Option<bool>,
}

impl ManagedDependency {
    fn matches(&self, coord: &Coordinate) -> bool {
        self.group == coord.group && self.artifact == coord.artifact
    }
}

/// The result of applying management to a declared dependency: the
/// managed dependency plus the pre-management (declared) values, so
/// downstream consumers can report both (§4.H step 7).
#[derive(Debug, Clone)]
pub struct ManagedResult {
    pub managed: Dependency,
    pub original_version: Option<String>,
    pub original_scope: Scope,
    pub original_optional: bool,
}

/// Dependency management: a flat table of overrides collected from the
/// ancestor path's `managed-dependencies` declarations (§3, §4.G
/// `pre_manage`).
#[derive(Debug, Clone, Default)]
pub struct DependencyManager {
    entries: Vec<ManagedDependency>,
}

impl DependencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: ManagedDependency) -> Self {
        self.entries.push(entry);
        self
    }

    /// Apply management to `dep`, returning the (possibly) rewritten
    /// dependency alongside the original declared values. When
    /// `disable_version_management` is set (relocation preserved the
    /// artifact identity), the version override is skipped but scope/
    /// exclusions/optional overrides still apply.
    pub fn pre_manage(&self, dep: &Dependency, disable_version_management: bool) -> ManagedResult {
        let original_version = Some(dep.coordinate.version.clone());
        let original_scope = dep.scope;
        let original_optional = dep.optional;

        let mut managed = dep.clone();
        if let Some(entry) = self.entries.iter().find(|e| e.matches(&dep.coordinate)) {
            if !disable_version_management {
                if let Some(v) = &entry.version {
                    managed.coordinate.version = v.clone();
                }
            }
            if let Some(scope) = entry.scope {
                managed.scope = scope;
            }
            if let Some(optional) = entry.optional {
                managed.optional = optional;
            }
            if !entry.exclusions.is_empty() {
                managed.exclusions.extend(entry.exclusions.iter().cloned());
            }
        }

        ManagedResult {
            managed,
            original_version,
            original_scope,
            original_optional,
        }
    }

    /// Derive the child context's manager: union of this table with the
    /// entries declared on the newly-expanded descriptor's managed deps.
    pub fn derive(&self, new_entries: &[ManagedDependency]) -> DependencyManager {
        let mut entries = self.entries.clone();
        entries.extend(new_entries.iter().cloned());
        DependencyManager { entries }
    }
}

/// Decides whether a dependency's *children* get expanded (the edge
/// itself may still be retained as a leaf). Distinct from [`Selector`],
/// which decides whether the edge exists at all.
#[derive(Debug, Clone)]
pub enum Traverser {
    /// Expand everything except optional dependencies past depth 1.
    ExcludeOptionalAtDepth { max_depth: u32 },
    /// Always expand (subject to the `no-descriptor` check the collector
    /// performs independently for `pom`-extension coordinates).
    Always,
}

impl Traverser {
    pub fn traverse(&self, dep: &Dependency, depth: u32) -> bool {
        match self {
            Traverser::Always => true,
            Traverser::ExcludeOptionalAtDepth { max_depth } => {
                !(dep.optional && depth > *max_depth)
            }
        }
    }

    pub fn default_traverser() -> Self {
        Traverser::ExcludeOptionalAtDepth { max_depth: 0 }
    }

    /// Traversers are stateless with respect to context in this model;
    /// `derive` exists for symmetry with the other three policies and
    /// returns an identical traverser (the original sources let traversers
    /// react to the context for plugin-specific extensions, which are out
    /// of scope here).
    pub fn derive(&self) -> Traverser {
        self.clone()
    }
}

/// Filters which *versions* of a dependency are acceptable, independent
/// of the range match itself (e.g. excluding snapshots in a release
/// build).
#[derive(Debug, Clone)]
pub enum VersionFilter {
    AcceptAll,
    ExcludeSnapshots,
}

impl VersionFilter {
    pub fn accept(&self, version: &crate::version::Version) -> bool {
        match self {
            VersionFilter::AcceptAll => true,
            VersionFilter::ExcludeSnapshots => !version.is_snapshot(),
        }
    }

    pub fn derive(&self) -> VersionFilter {
        self.clone()
    }
}

/// A dependency range constraint accumulated across edges contributing to
/// a conflict group, used by the conflict resolver (§4.H step 2) to check
/// the winner against the intersection of all declared constraints.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    pub range: Option<VersionRange>,
}

impl VersionConstraint {
    pub fn unconstrained() -> Self {
        Self { range: None }
    }

    pub fn from_range(range: VersionRange) -> Self {
        Self { range: Some(range) }
    }

    /// Intersect two constraints; `None` on the pair means "no
    /// constraint seen yet", not "empty".
    pub fn intersect(&self, other: &VersionConstraint) -> Option<VersionConstraint> {
        match (&self.range, &other.range) {
            (None, None) => Some(VersionConstraint::unconstrained()),
            (Some(r), None) | (None, Some(r)) => Some(VersionConstraint::from_range(r.clone())),
            (Some(a), Some(b)) => a.intersect(b).map(VersionConstraint::from_range),
        }
    }

    pub fn satisfied_by(&self, version: &crate::version::Version) -> bool {
        match &self.range {
            None => true,
            Some(r) => r.contains(version),
        }
    }
}
