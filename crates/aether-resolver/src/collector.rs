//! Dependency collector (§4.G): depth-first, memoised traversal that
//! resolves version ranges, reads descriptors, applies the
//! selector/manager/traverser/filter hierarchy, truncates cycles, and
//! builds the raw (pre-conflict-resolution) dependency graph.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use aether_core::config::ConnectorConfig;
use aether_core::coordinate::Coordinate;
use aether_core::dependency::Dependency;
use aether_core::range::VersionRange;
use aether_core::selector::{DependencyManager, ManagedDependency, Selector, Traverser, VersionFilter};
use aether_core::session::Session;
use aether_metadata::descriptor::{resolve_descriptor, DescriptorCache, RepoHandle};
use aether_metadata::version_range::resolve_version_range;
use aether_transport::auth::Credentials;
use aether_transport::connector::build_transport;
use aether_transport::repository::RemoteRepository;
use aether_transport::transport::Transport;
use aether_util::errors::AetherError;
use petgraph::graph::NodeIndex;

use crate::arena::{node_identity, DependencyGraph, GraphNode, NodeState};

type BoxFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A repository paired with the transport already built for it.
#[derive(Clone)]
pub struct ResolvedRepo {
    pub repository: RemoteRepository,
    pub transport: Transport,
}

impl ResolvedRepo {
    pub fn new(repository: RemoteRepository, transport: Transport) -> Self {
        Self { repository, transport }
    }
}

/// A `VersionRangeResolution`/`ArtifactDescriptor` failure captured for a
/// single dependency rather than aborting the whole collection (§4.G
/// failure semantics).
#[derive(Debug, Clone)]
pub struct CollectionError {
    pub coordinate: Coordinate,
    pub message: String,
}

pub struct CollectionResult {
    pub graph: DependencyGraph,
    pub root: NodeIndex,
    pub errors: Vec<CollectionError>,
}

/// A node plus its not-yet-arena-attached children, the unit memoised by
/// the collector's child pool.
#[derive(Clone)]
struct Subtree {
    node: GraphNode,
    children: Vec<Subtree>,
}

impl Subtree {
    fn stub(coordinate: Coordinate, managed: &Dependency, original: &OriginalValues) -> Self {
        Subtree {
            node: GraphNode {
                coordinate,
                scope: managed.scope,
                optional: managed.optional,
                exclusions: managed.exclusions.clone(),
                original_version: original.version.clone(),
                original_scope: original.scope,
                original_optional: original.optional,
                repositories: Vec::new(),
                aliases: Vec::new(),
                state: NodeState::Stub,
                cycle_target: None,
            },
            children: Vec::new(),
        }
    }

    fn cyclic(coordinate: Coordinate, managed: &Dependency, original: &OriginalValues, aliases: Vec<Coordinate>) -> Self {
        Subtree {
            node: GraphNode {
                coordinate: coordinate.clone(),
                scope: managed.scope,
                optional: managed.optional,
                exclusions: managed.exclusions.clone(),
                original_version: original.version.clone(),
                original_scope: original.scope,
                original_optional: original.optional,
                repositories: Vec::new(),
                aliases,
                state: NodeState::Cyclic,
                cycle_target: Some(coordinate),
            },
            children: Vec::new(),
        }
    }
}

struct OriginalValues {
    version: Option<String>,
    scope: aether_core::dependency::Scope,
    optional: bool,
}

struct CollectCtx {
    session: Session,
    descriptor_cache: DescriptorCache,
    memo: Mutex<HashMap<String, Vec<Subtree>>>,
    errors: Mutex<Vec<CollectionError>>,
    fail_on_error: bool,
}

impl CollectCtx {
    fn record_error(&self, coordinate: Coordinate, message: String) {
        self.errors.lock().unwrap().push(CollectionError { coordinate, message });
    }
}

/// Run the collector starting from `root_coord`, fetched against
/// `root_repos`. Returns the raw graph (before conflict resolution) plus
/// any per-dependency errors bagged along the way.
pub async fn collect(
    session: &Session,
    root_coord: &Coordinate,
    root_repos: Vec<ResolvedRepo>,
) -> miette::Result<CollectionResult> {
    let ctx = Arc::new(CollectCtx {
        session: session.clone(),
        descriptor_cache: DescriptorCache::new(),
        memo: Mutex::new(HashMap::new()),
        errors: Mutex::new(Vec::new()),
        fail_on_error: session.config.dependency_collector.fail_on_missing_descriptor,
    });

    let handles: Vec<RepoHandle> = root_repos
        .iter()
        .map(|r| RepoHandle { repository: &r.repository, transport: &r.transport })
        .collect();
    let desc = resolve_descriptor(session, &ctx.descriptor_cache, root_coord, &handles).await?;

    let root_child_repos = aggregate_repos(&root_repos, &desc.declared_repositories);
    let root_mgr = Arc::new(session.manager.derive(&managed_entries_from(&desc.managed_dependencies)));
    let root_identity = node_identity(&desc.coordinate);

    let mut children = Vec::new();
    for dep in &desc.dependencies {
        let sub = process_dependency(
            ctx.clone(),
            dep.clone(),
            Arc::new(root_child_repos.clone()),
            session.selector.clone(),
            root_mgr.clone(),
            session.traverser.clone(),
            session.version_filter.clone(),
            vec![root_identity.clone()],
            1,
        )
        .await;
        children.extend(sub);
    }

    let mut graph = DependencyGraph::new();
    let root_node = GraphNode::root(desc.coordinate.clone(), desc.declared_repositories.clone());
    let root_idx = graph.add_node(root_node);
    attach(&mut graph, root_idx, children);

    let errors = ctx.errors.lock().unwrap().clone();
    if ctx.fail_on_error && !errors.is_empty() {
        return Err(AetherError::ArtifactDescriptor {
            coordinate: errors[0].coordinate.to_string(),
            message: format!("{} (and {} more)", errors[0].message, errors.len() - 1),
        }
        .into());
    }

    Ok(CollectionResult { graph, root: root_idx, errors })
}

fn process_dependency(
    ctx: Arc<CollectCtx>,
    dep: Dependency,
    repos: Arc<Vec<ResolvedRepo>>,
    sel: Arc<Selector>,
    mgr: Arc<DependencyManager>,
    trv: Arc<Traverser>,
    vf: Arc<VersionFilter>,
    ancestors: Vec<String>,
    depth: u32,
) -> BoxFut<Vec<Subtree>> {
    Box::pin(async move {
        if !sel.accept(&dep) {
            return Vec::new();
        }

        let pre = mgr.pre_manage(&dep, false);
        let managed = pre.managed.clone();
        let original = OriginalValues {
            version: pre.original_version.clone(),
            scope: pre.original_scope,
            optional: pre.original_optional,
        };

        if managed.scope == aether_core::dependency::Scope::System {
            return vec![system_subtree(managed, original, ctx)];
        }

        let no_descriptor = managed.coordinate.is_descriptor_only();
        let should_traverse = !no_descriptor && trv.traverse(&managed, depth);

        let versions = match resolve_versions(&ctx.session, &managed.coordinate, &repos).await {
            Ok(versions) => versions,
            Err(e) => {
                ctx.record_error(managed.coordinate.clone(), e.to_string());
                return Vec::new();
            }
        };

        let mut subtrees = Vec::new();
        for version in versions {
            let mut candidate = managed.coordinate.clone();
            candidate.version = version;

            let handles: Vec<RepoHandle> = repos
                .iter()
                .map(|r| RepoHandle { repository: &r.repository, transport: &r.transport })
                .collect();
            let desc = match resolve_descriptor(&ctx.session, &ctx.descriptor_cache, &candidate, &handles).await {
                Ok(desc) => desc,
                Err(e) => {
                    ctx.record_error(candidate.clone(), e.to_string());
                    subtrees.push(Subtree::stub(candidate, &managed, &original));
                    continue;
                }
            };

            let effective = desc.coordinate.clone();
            let identity = node_identity(&effective);

            if ancestors.contains(&identity) {
                subtrees.push(Subtree::cyclic(effective, &managed, &original, desc.aliases.clone()));
                continue;
            }

            let child_repos = aggregate_repos(&repos, &desc.declared_repositories);
            let child_repo_ids: Vec<String> = child_repos.iter().map(|r| r.repository.id.clone()).collect();
            let memo_key = format!(
                "{}@{}|{}|{:p}|{:p}|{:p}|{:p}",
                effective.identity_key(),
                effective.version,
                child_repo_ids.join(","),
                Arc::as_ptr(&sel),
                Arc::as_ptr(&mgr),
                Arc::as_ptr(&trv),
                Arc::as_ptr(&vf),
            );

            let mut node = GraphNode {
                coordinate: effective.clone(),
                scope: managed.scope,
                optional: managed.optional,
                exclusions: managed.exclusions.clone(),
                original_version: original.version.clone(),
                original_scope: original.scope,
                original_optional: original.optional,
                repositories: desc.declared_repositories.clone(),
                aliases: desc.aliases.clone(),
                state: NodeState::Expanding,
                cycle_target: None,
            };

            if let Some(cached_children) = ctx.memo.lock().unwrap().get(&memo_key).cloned() {
                node.state = NodeState::Expanded;
                subtrees.push(Subtree { node, children: cached_children });
                continue;
            }

            if !should_traverse || desc.dependencies.is_empty() {
                node.state = if no_descriptor { NodeState::Stub } else { NodeState::Expanded };
                subtrees.push(Subtree { node, children: Vec::new() });
                continue;
            }

            let child_sel = Arc::new(sel.derive(&managed));
            let child_mgr = Arc::new(mgr.derive(&managed_entries_from(&desc.managed_dependencies)));
            let child_trv = Arc::new(trv.derive());
            let child_vf = Arc::new(vf.derive());
            let child_repos_shared = Arc::new(child_repos);

            let mut next_ancestors = ancestors.clone();
            next_ancestors.push(identity);

            let mut children = Vec::new();
            for child_dep in &desc.dependencies {
                let sub = process_dependency(
                    ctx.clone(),
                    child_dep.clone(),
                    child_repos_shared.clone(),
                    child_sel.clone(),
                    child_mgr.clone(),
                    child_trv.clone(),
                    child_vf.clone(),
                    next_ancestors.clone(),
                    depth + 1,
                )
                .await;
                children.extend(sub);
            }

            node.state = NodeState::Expanded;
            ctx.memo.lock().unwrap().insert(memo_key, children.clone());
            subtrees.push(Subtree { node, children });
        }

        subtrees
    })
}

/// `system`-scoped dependencies never touch a remote repository (§6): the
/// resolved artifact is whatever sits at `systemPath` on local disk, and
/// the subtree is always a terminal leaf.
fn system_subtree(managed: Dependency, original: OriginalValues, ctx: Arc<CollectCtx>) -> Subtree {
    let candidate = managed.coordinate.clone();
    match &managed.system_path {
        Some(path) if path.is_file() => Subtree::stub(candidate, &managed, &original),
        Some(path) => {
            ctx.record_error(candidate.clone(), format!("systemPath does not exist: {}", path.display()));
            Subtree::stub(candidate, &managed, &original)
        }
        None => {
            ctx.record_error(candidate.clone(), "system-scoped dependency declared without a systemPath".to_string());
            Subtree::stub(candidate, &managed, &original)
        }
    }
}

async fn resolve_versions(session: &Session, coord: &Coordinate, repos: &[ResolvedRepo]) -> miette::Result<Vec<String>> {
    if VersionRange::looks_like_range(&coord.version) {
        let repositories: Vec<RemoteRepository> = repos.iter().map(|r| r.repository.clone()).collect();
        let transports: Vec<Transport> = repos.iter().map(|r| r.transport.clone()).collect();
        let result = resolve_version_range(session, coord, &repositories, &transports).await?;
        Ok(result.versions.into_iter().map(|v| v.original).collect())
    } else {
        Ok(vec![coord.version.clone()])
    }
}

fn managed_entries_from(deps: &[Dependency]) -> Vec<ManagedDependency> {
    deps.iter()
        .map(|d| ManagedDependency {
            group: d.coordinate.group.clone(),
            artifact: d.coordinate.artifact.clone(),
            version: Some(d.coordinate.version.clone()),
            scope: Some(d.scope),
            exclusions: d.exclusions.clone(),
            optional: Some(d.optional),
        })
        .collect()
}

/// Recessive aggregation: repositories already present (by id) keep
/// their existing transport; new declared repositories get one built
/// with default connector settings and no credentials.
fn aggregate_repos(parent: &[ResolvedRepo], declared: &[RemoteRepository]) -> Vec<ResolvedRepo> {
    let mut result: Vec<ResolvedRepo> = parent.to_vec();
    let existing: HashSet<String> = result.iter().map(|r| r.repository.id.clone()).collect();
    for repo in declared {
        if existing.contains(&repo.id) {
            continue;
        }
        if let Ok(transport) = build_transport(repo, &ConnectorConfig::default(), Credentials::default()) {
            result.push(ResolvedRepo::new(repo.clone(), transport));
        }
    }
    result
}

fn attach(graph: &mut DependencyGraph, parent: NodeIndex, subtrees: Vec<Subtree>) {
    for sub in subtrees {
        let idx = graph.add_node(sub.node);
        graph.add_edge(parent, idx, ());
        attach(graph, idx, sub.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_transport::file_transport::FileTransport;
    use petgraph::Direction;
    use std::fs;

    fn write_pom(dir: &std::path::Path, group: &str, artifact: &str, version: &str, xml: &str) {
        let path = dir.join(group.replace('.', "/")).join(artifact).join(version);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(format!("{artifact}-{version}.pom")), xml).unwrap();
    }

    fn local_repos(dir: &std::path::Path) -> Vec<ResolvedRepo> {
        let repo = RemoteRepository::new("local", format!("file:{}", dir.display())).unwrap();
        let transport = Transport::File(FileTransport::new(dir));
        vec![ResolvedRepo::new(repo, transport)]
    }

    #[tokio::test]
    async fn collects_direct_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "org.example",
            "app",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>app</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.example</groupId>
                        <artifactId>lib</artifactId>
                        <version>2.0</version>
                    </dependency>
                </dependencies>
            </project>"#,
        );
        write_pom(
            dir.path(),
            "org.example",
            "lib",
            "2.0",
            r#"<project><groupId>org.example</groupId><artifactId>lib</artifactId><version>2.0</version></project>"#,
        );

        let session = Session::new("/tmp/repo");
        let coord = Coordinate::new("org.example", "app", "1.0");
        let result = collect(&session, &coord, local_repos(dir.path())).await.unwrap();

        assert_eq!(result.graph.node_count(), 2);
        assert!(result.errors.is_empty());
        let children: Vec<_> = result.graph.neighbors_directed(result.root, Direction::Outgoing).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(result.graph[children[0]].coordinate.artifact, "lib");
    }

    #[tokio::test]
    async fn exclusion_prunes_transitive_dependency() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "org.example",
            "app",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>app</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.example</groupId>
                        <artifactId>mid</artifactId>
                        <version>1.0</version>
                        <exclusions>
                            <exclusion>
                                <groupId>org.example</groupId>
                                <artifactId>leaf</artifactId>
                            </exclusion>
                        </exclusions>
                    </dependency>
                </dependencies>
            </project>"#,
        );
        write_pom(
            dir.path(),
            "org.example",
            "mid",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>mid</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.example</groupId>
                        <artifactId>leaf</artifactId>
                        <version>1.0</version>
                    </dependency>
                </dependencies>
            </project>"#,
        );
        write_pom(
            dir.path(),
            "org.example",
            "leaf",
            "1.0",
            r#"<project><groupId>org.example</groupId><artifactId>leaf</artifactId><version>1.0</version></project>"#,
        );

        let session = Session::new("/tmp/repo");
        let coord = Coordinate::new("org.example", "app", "1.0");
        let result = collect(&session, &coord, local_repos(dir.path())).await.unwrap();

        let names: Vec<String> = result.graph.node_weights().map(|n| n.coordinate.artifact.clone()).collect();
        assert!(names.contains(&"mid".to_string()));
        assert!(!names.contains(&"leaf".to_string()));
    }

    #[tokio::test]
    async fn cyclic_dependency_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "org.example",
            "a",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>a</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.example</groupId>
                        <artifactId>b</artifactId>
                        <version>1.0</version>
                    </dependency>
                </dependencies>
            </project>"#,
        );
        write_pom(
            dir.path(),
            "org.example",
            "b",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>b</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.example</groupId>
                        <artifactId>a</artifactId>
                        <version>1.0</version>
                    </dependency>
                </dependencies>
            </project>"#,
        );

        let session = Session::new("/tmp/repo");
        let coord = Coordinate::new("org.example", "a", "1.0");

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), collect(&session, &coord, local_repos(dir.path())))
            .await
            .expect("collection should terminate despite the cycle")
            .unwrap();

        let cyclic_present = result
            .graph
            .node_weights()
            .any(|n| matches!(n.state, crate::arena::NodeState::Cyclic));
        assert!(cyclic_present);
    }

    #[tokio::test]
    async fn missing_descriptor_becomes_stub_and_is_bagged() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "org.example",
            "app",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>app</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.missing</groupId>
                        <artifactId>ghost</artifactId>
                        <version>1.0</version>
                    </dependency>
                </dependencies>
            </project>"#,
        );

        let session = Session::new("/tmp/repo");
        let coord = Coordinate::new("org.example", "app", "1.0");
        let result = collect(&session, &coord, local_repos(dir.path())).await.unwrap();

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].coordinate.artifact, "ghost");
        let stub_present = result
            .graph
            .node_weights()
            .any(|n| n.coordinate.artifact == "ghost" && matches!(n.state, crate::arena::NodeState::Stub));
        assert!(stub_present);
    }

    #[tokio::test]
    async fn system_scoped_dependency_with_existing_file_resolves_without_repository_access() {
        let dir = tempfile::tempdir().unwrap();
        let system_jar = dir.path().join("vendor").join("local-lib.jar");
        fs::create_dir_all(system_jar.parent().unwrap()).unwrap();
        fs::write(&system_jar, b"not a real jar").unwrap();

        write_pom(
            dir.path(),
            "org.example",
            "app",
            "1.0",
            &format!(
                r#"<project>
                    <groupId>org.example</groupId><artifactId>app</artifactId><version>1.0</version>
                    <dependencies>
                        <dependency>
                            <groupId>org.example</groupId>
                            <artifactId>local-lib</artifactId>
                            <version>9.0</version>
                            <scope>system</scope>
                            <systemPath>{}</systemPath>
                        </dependency>
                    </dependencies>
                </project>"#,
                system_jar.display()
            ),
        );

        let session = Session::new("/tmp/repo");
        let coord = Coordinate::new("org.example", "app", "1.0");
        let result = collect(&session, &coord, local_repos(dir.path())).await.unwrap();

        assert!(result.errors.is_empty());
        let node = result
            .graph
            .node_weights()
            .find(|n| n.coordinate.artifact == "local-lib")
            .expect("system-scoped node present");
        assert_eq!(node.scope, aether_core::dependency::Scope::System);
        assert_eq!(node.state, crate::arena::NodeState::Stub);
    }

    #[tokio::test]
    async fn system_scoped_dependency_with_missing_file_is_bagged_as_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pom(
            dir.path(),
            "org.example",
            "app",
            "1.0",
            r#"<project>
                <groupId>org.example</groupId><artifactId>app</artifactId><version>1.0</version>
                <dependencies>
                    <dependency>
                        <groupId>org.example</groupId>
                        <artifactId>local-lib</artifactId>
                        <version>9.0</version>
                        <scope>system</scope>
                        <systemPath>/nonexistent/local-lib.jar</systemPath>
                    </dependency>
                </dependencies>
            </project>"#,
        );

        let session = Session::new("/tmp/repo");
        let coord = Coordinate::new("org.example", "app", "1.0");
        let result = collect(&session, &coord, local_repos(dir.path())).await.unwrap();

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].coordinate.artifact, "local-lib");
    }
}
