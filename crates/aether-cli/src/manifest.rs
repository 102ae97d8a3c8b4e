//! `Kargo.toml` manifest: just enough of the teacher's project file format
//! to point `resolve`/`fetch`/`tree` at a root coordinate and the
//! repositories to fetch its descriptor (and transitive graph) from. The
//! project's own declared dependencies live in its own POM-equivalent
//! descriptor in one of those repositories, the same way Maven resolves
//! a module's transitive graph starting from its own coordinate.

use std::collections::BTreeMap;
use std::path::Path;

use aether_core::coordinate::Coordinate;
use aether_util::errors::AetherError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub package: PackageSection,
    #[serde(default)]
    pub repositories: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct PackageSection {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl Manifest {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(AetherError::Io)?;
        toml::from_str(&content).map_err(|e| {
            AetherError::InvalidInput {
                message: format!("failed to parse {}: {e}", path.display()),
            }
            .into()
        })
    }

    pub fn root_coordinate(&self) -> Coordinate {
        Coordinate::new(&self.package.group, &self.package.name, &self.package.version)
    }
}
