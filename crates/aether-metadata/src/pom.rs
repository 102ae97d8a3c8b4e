//! Artifact descriptor XML parsing: dependency declarations, parent
//! inheritance, property interpolation, BOM imports, relocation and
//! declared-repository entries (§4.E).

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use aether_util::errors::AetherError;

/// A parsed descriptor document (Maven-POM-equivalent).
#[derive(Debug, Clone, Default)]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub name: Option<String>,

    pub parent: Option<ParentRef>,
    pub properties: BTreeMap<String, String>,
    pub dependencies: Vec<PomDependency>,
    pub dependency_management: Vec<PomDependency>,
    pub repositories: Vec<PomRepository>,
    pub relocation: Option<PomRelocation>,
}

#[derive(Debug, Clone)]
pub struct ParentRef {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub system_path: Option<String>,
    pub exclusions: Vec<PomExclusion>,
}

#[derive(Debug, Clone)]
pub struct PomExclusion {
    pub group_id: String,
    pub artifact_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PomRepository {
    pub id: String,
    pub url: String,
}

/// `<distributionManagement><relocation>`: redirects every reference to
/// this coordinate onto another (§4.E step 3, §GLOSSARY "Relocation").
#[derive(Debug, Clone, Default)]
pub struct PomRelocation {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
}

impl PomRelocation {
    pub fn is_empty(&self) -> bool {
        self.group_id.is_none() && self.artifact_id.is_none() && self.version.is_none()
    }
}

impl Pom {
    pub fn effective_group_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.group_id.as_str()))
    }

    pub fn effective_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or(self.parent.as_ref().map(|p| p.version.as_str()))
    }

    /// Resolve `${property}` references using POM properties and
    /// built-in project variables.
    pub fn interpolate(&self, input: &str) -> String {
        let mut result = input.to_string();
        let mut iterations = 0;
        while result.contains("${") && iterations < 20 {
            iterations += 1;
            let mut new = result.clone();
            while let Some(start) = new.find("${") {
                let Some(end) = new[start..].find('}') else {
                    break;
                };
                let key = &new[start + 2..start + end];
                let value = self.resolve_property(key);
                if let Some(val) = value {
                    new = format!("{}{}{}", &new[..start], val, &new[start + end + 1..]);
                } else {
                    break;
                }
            }
            if new == result {
                break;
            }
            result = new;
        }
        result
    }

    fn resolve_property(&self, key: &str) -> Option<String> {
        match key {
            "project.groupId" | "pom.groupId" => self.effective_group_id().map(String::from),
            "project.artifactId" | "pom.artifactId" => self.artifact_id.clone(),
            "project.version" | "pom.version" => self.effective_version().map(String::from),
            "project.packaging" | "pom.packaging" => self.packaging.clone(),
            "project.parent.groupId" => self.parent.as_ref().map(|p| p.group_id.clone()),
            "project.parent.version" => self.parent.as_ref().map(|p| p.version.clone()),
            _ => self.properties.get(key).cloned(),
        }
    }

    pub fn resolve_properties(&mut self) {
        let snapshot = self.clone();
        for dep in self.dependencies.iter_mut().chain(self.dependency_management.iter_mut()) {
            dep.group_id = snapshot.interpolate(&dep.group_id);
            dep.artifact_id = snapshot.interpolate(&dep.artifact_id);
            if let Some(v) = &dep.version {
                dep.version = Some(snapshot.interpolate(v));
            }
        }
    }

    /// Merge a parent POM's properties and dependency management into
    /// this one; the child's own entries always win.
    pub fn apply_parent(&mut self, parent: &Pom) {
        for (k, v) in &parent.properties {
            self.properties.entry(k.clone()).or_insert_with(|| v.clone());
        }
        if self.group_id.is_none() {
            self.group_id = parent.effective_group_id().map(String::from);
        }
        if self.version.is_none() {
            self.version = parent.effective_version().map(String::from);
        }
        for dm in &parent.dependency_management {
            let dominated = self
                .dependency_management
                .iter()
                .any(|d| d.group_id == dm.group_id && d.artifact_id == dm.artifact_id);
            if !dominated {
                self.dependency_management.push(dm.clone());
            }
        }
    }

    /// BOM imports: `dependencyManagement` entries with
    /// `scope=import, type=pom` (§SPEC_FULL supplement).
    pub fn bom_imports(&self) -> Vec<&PomDependency> {
        self.dependency_management
            .iter()
            .filter(|d| d.scope.as_deref() == Some("import") && d.type_.as_deref().unwrap_or("jar") == "pom")
            .collect()
    }
}

/// Parse a descriptor XML document into a [`Pom`].
pub fn parse_pom(xml: &str) -> miette::Result<Pom> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pom = Pom::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    let mut current_dep: Option<PomDependency> = None;
    let mut current_exclusion: Option<PomExclusion> = None;
    let mut current_parent: Option<ParentRef> = None;
    let mut current_repo: Option<PomRepository> = None;
    let mut current_relocation: Option<PomRelocation> = None;
    let mut in_dep_mgmt = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                path.push(tag);
                text_buf.clear();
                let ctx = path.join(">");

                match ctx.as_str() {
                    "project>dependencyManagement>dependencies>dependency"
                    | "project>dependencies>dependency" => {
                        in_dep_mgmt = ctx.contains("dependencyManagement");
                        current_dep = Some(PomDependency {
                            group_id: String::new(),
                            artifact_id: String::new(),
                            version: None,
                            scope: None,
                            optional: false,
                            classifier: None,
                            type_: None,
                            system_path: None,
                            exclusions: Vec::new(),
                        });
                    }
                    _ if ctx.ends_with(">exclusion") && current_dep.is_some() => {
                        current_exclusion = Some(PomExclusion { group_id: String::new(), artifact_id: None });
                    }
                    "project>parent" => {
                        current_parent = Some(ParentRef {
                            group_id: String::new(),
                            artifact_id: String::new(),
                            version: String::new(),
                        });
                    }
                    "project>repositories>repository" => {
                        current_repo = Some(PomRepository { id: String::new(), url: String::new() });
                    }
                    "project>distributionManagement>relocation" => {
                        current_relocation = Some(PomRelocation::default());
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");
                let depth = path.len();

                if depth == 3 && path.get(1).map(String::as_str) == Some("properties") {
                    let name = path.last().cloned().unwrap_or_default();
                    pom.properties.insert(name, text_buf.clone());
                }

                if let Some(ref mut dep) = current_dep {
                    if let Some(ref mut excl) = current_exclusion {
                        match path.last().map(String::as_str) {
                            Some("groupId") => excl.group_id = text_buf.clone(),
                            Some("artifactId") => excl.artifact_id = Some(text_buf.clone()),
                            _ => {}
                        }
                        if ctx.ends_with(">exclusion") {
                            if let Some(excl) = current_exclusion.take() {
                                dep.exclusions.push(excl);
                            }
                        }
                    } else {
                        match path.last().map(String::as_str) {
                            Some("groupId") if ctx.ends_with(">dependency>groupId") => dep.group_id = text_buf.clone(),
                            Some("artifactId") if ctx.ends_with(">dependency>artifactId") => dep.artifact_id = text_buf.clone(),
                            Some("version") if ctx.ends_with(">dependency>version") => dep.version = Some(text_buf.clone()),
                            Some("scope") if ctx.ends_with(">dependency>scope") => dep.scope = Some(text_buf.clone()),
                            Some("optional") if ctx.ends_with(">dependency>optional") => dep.optional = text_buf.trim() == "true",
                            Some("classifier") if ctx.ends_with(">dependency>classifier") => dep.classifier = Some(text_buf.clone()),
                            Some("type") if ctx.ends_with(">dependency>type") => dep.type_ = Some(text_buf.clone()),
                            Some("systemPath") if ctx.ends_with(">dependency>systemPath") => {
                                dep.system_path = Some(text_buf.clone())
                            }
                            _ => {}
                        }
                    }

                    if ctx == "project>dependencies>dependency" || ctx == "project>dependencyManagement>dependencies>dependency" {
                        if let Some(dep) = current_dep.take() {
                            if in_dep_mgmt {
                                pom.dependency_management.push(dep);
                            } else {
                                pom.dependencies.push(dep);
                            }
                        }
                        in_dep_mgmt = false;
                    }
                }

                if let Some(ref mut parent) = current_parent {
                    match path.last().map(String::as_str) {
                        Some("groupId") if ctx == "project>parent>groupId" => parent.group_id = text_buf.clone(),
                        Some("artifactId") if ctx == "project>parent>artifactId" => parent.artifact_id = text_buf.clone(),
                        Some("version") if ctx == "project>parent>version" => parent.version = text_buf.clone(),
                        _ => {}
                    }
                    if ctx == "project>parent" {
                        pom.parent = current_parent.take();
                    }
                }

                if let Some(ref mut repo) = current_repo {
                    match path.last().map(String::as_str) {
                        Some("id") if ctx == "project>repositories>repository>id" => repo.id = text_buf.clone(),
                        Some("url") if ctx == "project>repositories>repository>url" => repo.url = text_buf.clone(),
                        _ => {}
                    }
                    if ctx == "project>repositories>repository" {
                        if let Some(repo) = current_repo.take() {
                            pom.repositories.push(repo);
                        }
                    }
                }

                if let Some(ref mut reloc) = current_relocation {
                    match path.last().map(String::as_str) {
                        Some("groupId") if ctx == "project>distributionManagement>relocation>groupId" => {
                            reloc.group_id = Some(text_buf.clone());
                        }
                        Some("artifactId") if ctx == "project>distributionManagement>relocation>artifactId" => {
                            reloc.artifact_id = Some(text_buf.clone());
                        }
                        Some("version") if ctx == "project>distributionManagement>relocation>version" => {
                            reloc.version = Some(text_buf.clone());
                        }
                        _ => {}
                    }
                    if ctx == "project>distributionManagement>relocation" {
                        if let Some(reloc) = current_relocation.take() {
                            if !reloc.is_empty() {
                                pom.relocation = Some(reloc);
                            }
                        }
                    }
                }

                if depth == 2 {
                    match path.last().map(String::as_str) {
                        Some("groupId") => pom.group_id = Some(text_buf.clone()),
                        Some("artifactId") => pom.artifact_id = Some(text_buf.clone()),
                        Some("version") => pom.version = Some(text_buf.clone()),
                        Some("packaging") => pom.packaging = Some(text_buf.clone()),
                        Some("name") => pom.name = Some(text_buf.clone()),
                        _ => {}
                    }
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AetherError::ArtifactDescriptor {
                    coordinate: "<unknown>".to_string(),
                    message: format!("malformed descriptor XML: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(pom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <groupId>org.example</groupId>
    <artifactId>my-lib</artifactId>
    <version>1.0.0</version>
    <packaging>jar</packaging>
    <properties>
        <kotlin.version>2.3.0</kotlin.version>
    </properties>
    <dependencies>
        <dependency>
            <groupId>org.jetbrains.kotlin</groupId>
            <artifactId>kotlin-stdlib</artifactId>
            <version>${kotlin.version}</version>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>4.13.2</version>
            <scope>test</scope>
        </dependency>
    </dependencies>
</project>"#;

    #[test]
    fn parse_simple_pom() {
        let pom = parse_pom(SIMPLE_POM).unwrap();
        assert_eq!(pom.group_id.as_deref(), Some("org.example"));
        assert_eq!(pom.dependencies.len(), 2);
        assert_eq!(pom.properties.get("kotlin.version").unwrap(), "2.3.0");
    }

    #[test]
    fn property_interpolation() {
        let mut pom = parse_pom(SIMPLE_POM).unwrap();
        pom.resolve_properties();
        assert_eq!(pom.dependencies[0].version.as_deref(), Some("2.3.0"));
    }

    #[test]
    fn dependency_management_and_bom() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>org.example</groupId>
    <artifactId>parent</artifactId>
    <version>1.0.0</version>
    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>org.jetbrains.kotlinx</groupId>
                <artifactId>kotlinx-coroutines-bom</artifactId>
                <version>1.8.0</version>
                <type>pom</type>
                <scope>import</scope>
            </dependency>
            <dependency>
                <groupId>com.google.guava</groupId>
                <artifactId>guava</artifactId>
                <version>32.0.0-jre</version>
            </dependency>
        </dependencies>
    </dependencyManagement>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.dependency_management.len(), 2);
        assert_eq!(pom.bom_imports().len(), 1);
    }

    #[test]
    fn parent_ref_and_inheritance() {
        let parent_xml = r#"<?xml version="1.0"?>
<project>
    <groupId>org.example</groupId>
    <artifactId>parent-pom</artifactId>
    <version>2.0.0</version>
    <properties><shared>x</shared></properties>
</project>"#;
        let child_xml = r#"<?xml version="1.0"?>
<project>
    <parent>
        <groupId>org.example</groupId>
        <artifactId>parent-pom</artifactId>
        <version>2.0.0</version>
    </parent>
    <artifactId>child</artifactId>
</project>"#;
        let parent = parse_pom(parent_xml).unwrap();
        let mut child = parse_pom(child_xml).unwrap();
        child.apply_parent(&parent);
        assert_eq!(child.effective_group_id(), Some("org.example"));
        assert_eq!(child.effective_version(), Some("2.0.0"));
        assert_eq!(child.properties.get("shared").map(String::as_str), Some("x"));
    }

    #[test]
    fn exclusion_parsing() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>org.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <dependencies>
        <dependency>
            <groupId>com.example</groupId>
            <artifactId>lib</artifactId>
            <version>1.0</version>
            <exclusions>
                <exclusion>
                    <groupId>commons-logging</groupId>
                    <artifactId>commons-logging</artifactId>
                </exclusion>
            </exclusions>
        </dependency>
    </dependencies>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.dependencies[0].exclusions.len(), 1);
        assert_eq!(pom.dependencies[0].exclusions[0].group_id, "commons-logging");
    }

    #[test]
    fn relocation_parsing() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>org.old</groupId>
    <artifactId>old-name</artifactId>
    <version>1.0</version>
    <distributionManagement>
        <relocation>
            <groupId>org.new</groupId>
            <artifactId>new-name</artifactId>
            <version>2.0</version>
        </relocation>
    </distributionManagement>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        let reloc = pom.relocation.unwrap();
        assert_eq!(reloc.group_id.as_deref(), Some("org.new"));
        assert_eq!(reloc.artifact_id.as_deref(), Some("new-name"));
        assert_eq!(reloc.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn repository_parsing() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>g</groupId><artifactId>a</artifactId><version>1.0</version>
    <repositories>
        <repository>
            <id>thirdparty</id>
            <url>https://repo.example.com/thirdparty</url>
        </repository>
    </repositories>
</project>"#;
        let pom = parse_pom(xml).unwrap();
        assert_eq!(pom.repositories.len(), 1);
        assert_eq!(pom.repositories[0].id, "thirdparty");
    }

    #[test]
    fn project_version_interpolation() {
        let xml = r#"<?xml version="1.0"?>
<project>
    <groupId>org.example</groupId>
    <artifactId>lib</artifactId>
    <version>3.0.0</version>
    <dependencies>
        <dependency>
            <groupId>${project.groupId}</groupId>
            <artifactId>sibling</artifactId>
            <version>${project.version}</version>
        </dependency>
    </dependencies>
</project>"#;
        let mut pom = parse_pom(xml).unwrap();
        pom.resolve_properties();
        assert_eq!(pom.dependencies[0].group_id, "org.example");
        assert_eq!(pom.dependencies[0].version.as_deref(), Some("3.0.0"));
    }

    #[test]
    fn malformed_xml_is_artifact_descriptor_error() {
        let err = parse_pom("<project><groupId>g</artifactId></project>").unwrap_err();
        assert!(err.to_string().contains("artifact descriptor"));
    }
}
