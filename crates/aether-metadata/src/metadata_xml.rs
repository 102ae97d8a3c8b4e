//! `maven-metadata.xml` parsing (§4.F): artifact-level version listing
//! and version-level snapshot timestamp/build-number resolution.

use quick_xml::events::Event;
use quick_xml::Reader;

use aether_util::errors::AetherError;

#[derive(Debug, Clone, Default)]
pub struct MavenMetadata {
    pub group_id: String,
    pub artifact_id: String,
    pub latest: Option<String>,
    pub release: Option<String>,
    pub versions: Vec<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotMetadata {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub timestamp: Option<String>,
    pub build_number: Option<u32>,
    pub last_updated: Option<String>,
}

impl SnapshotMetadata {
    /// The filename-safe version string for this snapshot build, e.g.
    /// `1.0-20240615.143022-42`, falling back to the plain `-SNAPSHOT`
    /// version when no timestamp/build metadata is present.
    pub fn snapshot_base(&self, _artifact_id: &str) -> String {
        match (&self.timestamp, self.build_number) {
            (Some(ts), Some(build)) => {
                let base = self.version.trim_end_matches("-SNAPSHOT");
                format!("{base}-{ts}-{build}")
            }
            _ => self.version.clone(),
        }
    }
}

pub fn parse_metadata(xml: &str) -> miette::Result<MavenMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut meta = MavenMetadata::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text_buf.clear();
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");
                match ctx.as_str() {
                    "metadata>groupId" => meta.group_id = text_buf.clone(),
                    "metadata>artifactId" => meta.artifact_id = text_buf.clone(),
                    "metadata>versioning>latest" => meta.latest = Some(text_buf.clone()),
                    "metadata>versioning>release" => meta.release = Some(text_buf.clone()),
                    "metadata>versioning>lastUpdated" => meta.last_updated = Some(text_buf.clone()),
                    "metadata>versioning>versions>version" => meta.versions.push(text_buf.clone()),
                    _ => {}
                }
                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AetherError::VersionRangeResolution {
                    coordinate: "<unknown>".to_string(),
                    message: format!("malformed maven-metadata.xml: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(meta)
}

pub fn parse_snapshot_metadata(xml: &str) -> miette::Result<SnapshotMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut meta = SnapshotMetadata::default();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text_buf.clear();
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                let ctx = path.join(">");
                match ctx.as_str() {
                    "metadata>groupId" => meta.group_id = text_buf.clone(),
                    "metadata>artifactId" => meta.artifact_id = text_buf.clone(),
                    "metadata>version" => meta.version = text_buf.clone(),
                    "metadata>versioning>lastUpdated" => meta.last_updated = Some(text_buf.clone()),
                    "metadata>versioning>snapshot>timestamp" => meta.timestamp = Some(text_buf.clone()),
                    "metadata>versioning>snapshot>buildNumber" => {
                        meta.build_number = text_buf.trim().parse().ok();
                    }
                    _ => {}
                }
                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AetherError::VersionRangeResolution {
                    coordinate: "<unknown>".to_string(),
                    message: format!("malformed snapshot maven-metadata.xml: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(meta)
}
