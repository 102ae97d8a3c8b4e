//! The session: an immutable bundle of selectors, property maps, and
//! per-call caches threaded through every resolver operation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AetherConfig;
use crate::selector::{DependencyManager, Selector, Traverser, VersionFilter};

/// One link in the request trace: what operation led to the current one.
/// Exposed as a singly-linked list via `parent` so diagnostics can walk
/// back to the root without the session owning a growable `Vec` that
/// every clone would have to copy.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub description: String,
    pub parent: Option<Arc<RequestTrace>>,
}

impl RequestTrace {
    pub fn root(description: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            description: description.into(),
            parent: None,
        })
    }

    pub fn child(self: &Arc<Self>, description: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            description: description.into(),
            parent: Some(Arc::clone(self)),
        })
    }
}

/// Immutable session bundle. Cheap to clone (`Arc`-backed); mutation
/// goes through builder methods that return a new `Session`.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: AetherConfig,
    pub selector: Arc<Selector>,
    pub manager: Arc<DependencyManager>,
    pub traverser: Arc<Traverser>,
    pub version_filter: Arc<VersionFilter>,
    pub system_properties: Arc<BTreeMap<String, String>>,
    pub user_properties: Arc<BTreeMap<String, String>>,
    pub local_repository: PathBuf,
    pub trace: Arc<RequestTrace>,
}

impl Session {
    pub fn new(local_repository: impl Into<PathBuf>) -> Self {
        Self {
            config: AetherConfig::default(),
            selector: Arc::new(Selector::default_selector()),
            manager: Arc::new(DependencyManager::new()),
            traverser: Arc::new(Traverser::default_traverser()),
            version_filter: Arc::new(VersionFilter::AcceptAll),
            system_properties: Arc::new(BTreeMap::new()),
            user_properties: Arc::new(BTreeMap::new()),
            local_repository: local_repository.into(),
            trace: RequestTrace::root("collect"),
        }
    }

    pub fn with_config(mut self, config: AetherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    pub fn with_manager(mut self, manager: DependencyManager) -> Self {
        self.manager = Arc::new(manager);
        self
    }

    pub fn with_traverser(mut self, traverser: Traverser) -> Self {
        self.traverser = Arc::new(traverser);
        self
    }

    pub fn with_version_filter(mut self, filter: VersionFilter) -> Self {
        self.version_filter = Arc::new(filter);
        self
    }

    pub fn with_user_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut props = (*self.user_properties).clone();
        props.insert(key.into(), value.into());
        self.user_properties = Arc::new(props);
        self
    }

    /// Resolve a property: user properties win over system properties,
    /// matching Maven's property precedence.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.user_properties
            .get(key)
            .or_else(|| self.system_properties.get(key))
            .map(String::as_str)
    }

    /// Push a new frame onto the request trace, returning a session
    /// whose trace records how the caller got here.
    pub fn traced(&self, description: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.trace = self.trace.child(description);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_properties_override_system_properties() {
        let mut session = Session::new("/tmp/repo");
        session.system_properties = Arc::new(BTreeMap::from([(
            "os.name".to_string(),
            "linux".to_string(),
        )]));
        let session = session.with_user_property("os.name", "windows");
        assert_eq!(session.property("os.name"), Some("windows"));
    }

    #[test]
    fn traced_preserves_parent_chain() {
        let session = Session::new("/tmp/repo");
        let traced = session.traced("resolve org.example:lib:1.0");
        assert_eq!(traced.trace.description, "resolve org.example:lib:1.0");
        assert_eq!(traced.trace.parent.as_ref().unwrap().description, "collect");
    }

    #[test]
    fn builder_is_immutable() {
        let base = Session::new("/tmp/repo");
        let child = base.clone().with_user_property("k", "v");
        assert_eq!(base.property("k"), None);
        assert_eq!(child.property("k"), Some("v"));
    }
}
