//! Artifact coordinates: the value object every other component keys on.

use std::fmt;

use aether_util::errors::AetherError;

/// `(group, artifact, extension, classifier, version)`.
///
/// Two coordinates are the same *artifact identity* iff group, artifact,
/// extension and classifier match; version distinguishes revisions.
/// Immutable and hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub extension: String,
    pub classifier: String,
    pub version: String,
}

/// Extension used when none is given.
pub const DEFAULT_EXTENSION: &str = "jar";

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            classifier: String::new(),
            version: version.into(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = classifier.into();
        self
    }

    /// The artifact-identity key, ignoring version: `group:artifact:extension[:classifier]`.
    pub fn identity_key(&self) -> String {
        if self.classifier.is_empty() {
            format!("{}:{}:{}", self.group, self.artifact, self.extension)
        } else {
            format!(
                "{}:{}:{}:{}",
                self.group, self.artifact, self.extension, self.classifier
            )
        }
    }

    /// `true` if this coordinate names a `pom`-equivalent document rather
    /// than a recursively expandable binary artifact (§8 boundary behaviour).
    pub fn is_descriptor_only(&self) -> bool {
        self.extension.eq_ignore_ascii_case("pom")
    }

    /// Parse `"group:artifact:version"` or `"group:artifact:extension:version"`
    /// or `"group:artifact:extension:classifier:version"`.
    pub fn parse(spec: &str) -> miette::Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [group, artifact, version] => Ok(Coordinate::new(*group, *artifact, *version)),
            [group, artifact, extension, version] => Ok(Coordinate::new(*group, *artifact, *version)
                .with_extension(*extension)),
            [group, artifact, extension, classifier, version] => {
                Ok(Coordinate::new(*group, *artifact, *version)
                    .with_extension(*extension)
                    .with_classifier(*classifier))
            }
            _ => Err(AetherError::InvalidInput {
                message: format!("malformed coordinate: {spec}"),
            }
            .into()),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.classifier.is_empty() {
            write!(
                f,
                "{}:{}:{}:{}",
                self.group, self.artifact, self.extension, self.version
            )
        } else {
            write!(
                f,
                "{}:{}:{}:{}:{}",
                self.group, self.artifact, self.extension, self.classifier, self.version
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_short_form() {
        let c = Coordinate::parse("org.example:lib:1.0").unwrap();
        assert_eq!(c.group, "org.example");
        assert_eq!(c.artifact, "lib");
        assert_eq!(c.version, "1.0");
        assert_eq!(c.extension, "jar");
        assert_eq!(c.classifier, "");
    }

    #[test]
    fn parse_with_extension() {
        let c = Coordinate::parse("org.example:lib:pom:1.0").unwrap();
        assert_eq!(c.extension, "pom");
        assert!(c.is_descriptor_only());
    }

    #[test]
    fn parse_with_classifier() {
        let c = Coordinate::parse("org.example:lib:jar:sources:1.0").unwrap();
        assert_eq!(c.classifier, "sources");
    }

    #[test]
    fn parse_malformed_is_invalid_input() {
        let err = Coordinate::parse("not-a-coordinate").unwrap_err();
        assert!(err.to_string().contains("invalid input"));
    }

    #[test]
    fn identity_key_ignores_version() {
        let a = Coordinate::new("g", "a", "1.0");
        let b = Coordinate::new("g", "a", "2.0");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn display_round_trips_short_form() {
        let c = Coordinate::new("org.example", "lib", "1.0");
        assert_eq!(c.to_string(), "org.example:lib:jar:1.0");
    }
}
