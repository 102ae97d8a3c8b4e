//! Session-wide configuration: namespaced keys for the connector and
//! dependency collector, loaded from `~/.aether/config.toml`.

use aether_util::errors::AetherError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config properties under the `connector.*` namespace (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorConfig {
    #[serde(rename = "connect.timeout", default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(rename = "request.timeout", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(rename = "http.headers", default)]
    pub http_headers: BTreeMap<String, BTreeMap<String, String>>,
    /// Proxy URL (e.g. `http://proxy.internal:8080`) applied to every
    /// request the HTTP transport makes. `None` uses the system/no proxy.
    #[serde(rename = "http.proxy", default)]
    pub http_proxy: Option<String>,
    #[serde(rename = "checksums.algorithms", default = "default_checksum_algorithms")]
    pub checksum_algorithms: String,
    #[serde(rename = "checksums.strict", default)]
    pub checksums_strict: bool,
    #[serde(rename = "resumeDownloads", default = "default_true")]
    pub resume_downloads: bool,
    #[serde(rename = "resumeThreshold", default = "default_resume_threshold")]
    pub resume_threshold_bytes: u64,
    #[serde(rename = "syncContext.factory", default = "default_sync_context_factory")]
    pub sync_context_factory: String,
    #[serde(rename = "syncContext.nameMapper", default = "default_name_mapper")]
    pub sync_context_name_mapper: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            http_headers: BTreeMap::new(),
            http_proxy: None,
            checksum_algorithms: default_checksum_algorithms(),
            checksums_strict: false,
            resume_downloads: default_true(),
            resume_threshold_bytes: default_resume_threshold(),
            sync_context_factory: default_sync_context_factory(),
            sync_context_name_mapper: default_name_mapper(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_checksum_algorithms() -> String {
    "SHA-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_resume_threshold() -> u64 {
    1024 * 1024
}

fn default_sync_context_factory() -> String {
    "in-process".to_string()
}

fn default_name_mapper() -> String {
    "gav".to_string()
}

/// Config properties under the `dependencyCollector.*` namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyCollectorConfig {
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default)]
    pub fail_on_missing_descriptor: bool,
}

impl Default for DependencyCollectorConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_max_pool_size(),
            fail_on_missing_descriptor: false,
        }
    }
}

fn default_max_pool_size() -> u32 {
    5
}

/// The full session-wide config property map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AetherConfig {
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default, rename = "dependencyCollector")]
    pub dependency_collector: DependencyCollectorConfig,
    #[serde(default)]
    pub repositories: BTreeMap<String, String>,
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialEntry>,
}

/// Credential entry for a named repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "token-cmd")]
    pub token_cmd: Option<String>,
}

impl AetherConfig {
    /// Load configuration from `~/.aether/config.toml`, or defaults if
    /// the file doesn't exist.
    pub fn load() -> miette::Result<Self> {
        let path = Self::default_path();
        if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(AetherError::Io)?;
            toml::from_str(&content).map_err(|e| {
                AetherError::InvalidInput {
                    message: format!("failed to parse config: {e}"),
                }
                .into()
            })
        } else {
            Ok(Self::default())
        }
    }

    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// The Aether data directory (`~/.aether/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".aether")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let cfg = AetherConfig::default();
        assert_eq!(cfg.connector.checksum_algorithms, "SHA-1");
        assert!(cfg.connector.resume_downloads);
        assert_eq!(cfg.dependency_collector.max_pool_size, 5);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        std::env::set_var("HOME", "/nonexistent-aether-home-for-test");
        let cfg = AetherConfig::load().unwrap();
        assert_eq!(cfg.connector.connect_timeout_ms, 10_000);
    }
}
