//! Remote repository identity and URL scheme classification (§6).

use std::path::{Path, PathBuf};

use aether_util::errors::AetherError;

use crate::file_transport::WriteStrategy;

/// The URL scheme a repository was declared with, classifying which
/// transport (if any) can serve it.
#[derive(Debug, Clone)]
pub enum RepositoryScheme {
    File(PathBuf),
    SymlinkFile(PathBuf),
    HardlinkFile(PathBuf),
    Http,
    Https,
    /// A bundle (archive) repository. Recognised as a valid scheme per
    /// §6 but no concrete transport is mandated for it; resolving one
    /// always falls through to `NoTransporter`.
    Bundle(PathBuf),
}

impl RepositoryScheme {
    pub fn parse(url: &str) -> miette::Result<Self> {
        if let Some(rest) = url.strip_prefix("symlink+file:") {
            Ok(Self::SymlinkFile(PathBuf::from(rest)))
        } else if let Some(rest) = url.strip_prefix("hardlink+file:") {
            Ok(Self::HardlinkFile(PathBuf::from(rest)))
        } else if let Some(rest) = url.strip_prefix("file:") {
            Ok(Self::File(PathBuf::from(rest)))
        } else if let Some(rest) = url.strip_prefix("bundle:") {
            Ok(Self::Bundle(PathBuf::from(rest)))
        } else if url.starts_with("http://") {
            Ok(Self::Http)
        } else if url.starts_with("https://") {
            Ok(Self::Https)
        } else {
            Err(AetherError::InvalidInput {
                message: format!("unknown repository URL scheme: {url}"),
            }
            .into())
        }
    }

    pub fn file_base(&self) -> Option<&Path> {
        match self {
            Self::File(p) | Self::SymlinkFile(p) | Self::HardlinkFile(p) => Some(p),
            _ => None,
        }
    }

    pub fn write_strategy(&self) -> WriteStrategy {
        match self {
            Self::SymlinkFile(_) => WriteStrategy::Symlink,
            Self::HardlinkFile(_) => WriteStrategy::Hardlink,
            _ => WriteStrategy::Copy,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}

/// A configured remote repository.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
    pub id: String,
    pub url: String,
    pub scheme: RepositoryScheme,
}

impl RemoteRepository {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> miette::Result<Self> {
        let url = url.into();
        let scheme = RepositoryScheme::parse(&url)?;
        Ok(Self {
            id: id.into(),
            url,
            scheme,
        })
    }

    pub fn central() -> Self {
        Self::new("central", "https://repo.maven.apache.org/maven2")
            .expect("central repository URL is always valid")
    }
}
