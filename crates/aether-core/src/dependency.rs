//! Dependency model: `(coordinate, scope, optional?, exclusion-set)`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// A declared dependency: coordinate plus scope/optionality/exclusions.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
    /// `<systemPath>`, required for `Scope::System` (§6); never consulted
    /// for any other scope.
    pub system_path: Option<PathBuf>,
}

impl Dependency {
    pub fn new(coordinate: Coordinate, scope: Scope) -> Self {
        Self {
            coordinate,
            scope,
            optional: false,
            exclusions: Vec::new(),
            system_path: None,
        }
    }
}

/// A `(group, artifact)` wildcard exclusion pattern. An empty string
/// component matches any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub group: String,
    #[serde(default)]
    pub artifact: Option<String>,
}

impl Exclusion {
    pub fn matches(&self, coordinate: &Coordinate) -> bool {
        let group_matches = self.group == "*" || self.group == coordinate.group;
        let artifact_matches = match &self.artifact {
            None => true,
            Some(a) => a == "*" || a == &coordinate.artifact,
        };
        group_matches && artifact_matches
    }
}

/// The full scope vocabulary of §6, plus the `none` pseudo-scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    Compile,
    Provided,
    Runtime,
    Test,
    /// Requires a `systemPath`; never resolved against a remote repository.
    System,
    CompileOnly,
    TestRuntime,
    TestOnly,
    /// Pseudo-scope: the dependency contributes nothing to any classpath.
    None,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Compile
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::CompileOnly => "compileOnly",
            Scope::TestRuntime => "testRuntime",
            Scope::TestOnly => "testOnly",
            Scope::None => "none",
        };
        f.write_str(s)
    }
}

impl Scope {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "compile" => Scope::Compile,
            "provided" => Scope::Provided,
            "runtime" => Scope::Runtime,
            "test" => Scope::Test,
            "system" => Scope::System,
            "compileOnly" => Scope::CompileOnly,
            "testRuntime" => Scope::TestRuntime,
            "testOnly" => Scope::TestOnly,
            "none" => Scope::None,
            _ => return None,
        })
    }

    /// Effective scope for a child declared with `child_scope` under a
    /// parent whose effective scope is `self`, per the §6 inheritance
    /// table. Scopes outside the table (`system`, `compileOnly`,
    /// `testRuntime`, `testOnly`, `none`) propagate as declared — they
    /// have no inherited narrowing behaviour in the original sources.
    pub fn derive(self, child_scope: Scope) -> Scope {
        match (self, child_scope) {
            (Scope::Compile, Scope::Compile) => Scope::Compile,
            (Scope::Compile, Scope::Runtime) => Scope::Runtime,
            (Scope::Compile, Scope::Provided) => Scope::Provided,
            (Scope::Compile, Scope::Test) => Scope::Test,
            (Scope::Runtime, Scope::Compile) => Scope::Runtime,
            (Scope::Runtime, Scope::Runtime) => Scope::Runtime,
            (Scope::Provided, _) => Scope::Provided,
            (Scope::Test, _) => Scope::Test,
            (_, child) => child,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_table_matches_spec() {
        assert_eq!(Scope::Compile.derive(Scope::Compile), Scope::Compile);
        assert_eq!(Scope::Compile.derive(Scope::Runtime), Scope::Runtime);
        assert_eq!(Scope::Compile.derive(Scope::Provided), Scope::Provided);
        assert_eq!(Scope::Compile.derive(Scope::Test), Scope::Test);
        assert_eq!(Scope::Runtime.derive(Scope::Compile), Scope::Runtime);
        assert_eq!(Scope::Runtime.derive(Scope::Runtime), Scope::Runtime);
        assert_eq!(Scope::Provided.derive(Scope::Compile), Scope::Provided);
        assert_eq!(Scope::Provided.derive(Scope::Test), Scope::Provided);
        assert_eq!(Scope::Test.derive(Scope::Compile), Scope::Test);
    }

    #[test]
    fn exclusion_matches_wildcard_artifact() {
        let excl = Exclusion {
            group: "org.example".to_string(),
            artifact: None,
        };
        let coord = Coordinate::new("org.example", "lib", "1.0");
        assert!(excl.matches(&coord));
    }

    #[test]
    fn exclusion_does_not_match_other_group() {
        let excl = Exclusion {
            group: "org.example".to_string(),
            artifact: Some("lib".to_string()),
        };
        let coord = Coordinate::new("org.other", "lib", "1.0");
        assert!(!excl.matches(&coord));
    }

    #[test]
    fn scope_display_round_trips_parse() {
        for s in [
            Scope::Compile,
            Scope::Provided,
            Scope::Runtime,
            Scope::Test,
            Scope::System,
            Scope::CompileOnly,
            Scope::TestRuntime,
            Scope::TestOnly,
            Scope::None,
        ] {
            assert_eq!(Scope::parse(&s.to_string()), Some(s));
        }
    }
}
