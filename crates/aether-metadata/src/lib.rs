//! Artifact descriptor reading and versioning metadata for the Aether
//! dependency resolver (§4.E, §4.F): descriptor XML parsing with
//! relocation and parent inheritance, `maven-metadata.xml` parsing,
//! version range resolution, and the session-scoped descriptor cache.

pub mod descriptor;
pub mod metadata_xml;
pub mod pom;
pub mod version_range;
