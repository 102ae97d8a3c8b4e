//! Local-filesystem transport (§4.D.1): base path plus a write strategy
//! chosen when the destination and the repository share a filesystem.

use std::fs;
use std::path::PathBuf;

use aether_util::errors::AetherError;

use crate::transport::{Context, Location, Sink};

/// How `get` materialises a file-transport location at the destination
/// path. `Copy` is always safe; `Symlink`/`Hardlink` are cheaper but only
/// valid when source and destination share a filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    Copy,
    Symlink,
    Hardlink,
}

impl Default for WriteStrategy {
    fn default() -> Self {
        WriteStrategy::Copy
    }
}

#[derive(Debug, Clone)]
pub struct FileTransport {
    base: PathBuf,
    strategy: WriteStrategy,
}

impl FileTransport {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            strategy: WriteStrategy::Copy,
        }
    }

    pub fn with_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn resolve(&self, loc: &Location) -> PathBuf {
        self.base.join(loc.0.trim_start_matches('/'))
    }

    pub(crate) fn peek(&self, loc: &Location) -> miette::Result<bool> {
        Ok(self.resolve(loc).is_file())
    }

    pub(crate) fn get(&self, loc: &Location, sink: Sink<'_>, cx: &Context) -> miette::Result<u64> {
        let source = self.resolve(loc);
        if !source.is_file() {
            return Err(AetherError::NotFound {
                coordinate: loc.0.clone(),
                repo_id: "file".to_string(),
                url: source.display().to_string(),
            }
            .into());
        }
        let len = source.metadata().map_err(AetherError::Io)?.len();
        match sink {
            Sink::Memory(buf) => {
                let data = fs::read(&source).map_err(AetherError::Io)?;
                buf.clear();
                buf.extend_from_slice(&data);
            }
            Sink::Path(dest) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(AetherError::Io)?;
                }
                if dest.exists() {
                    fs::remove_file(dest).map_err(AetherError::Io)?;
                }
                match self.strategy {
                    WriteStrategy::Copy => {
                        fs::copy(&source, dest).map_err(AetherError::Io)?;
                    }
                    WriteStrategy::Symlink => {
                        #[cfg(unix)]
                        std::os::unix::fs::symlink(&source, dest).map_err(AetherError::Io)?;
                        #[cfg(not(unix))]
                        fs::copy(&source, dest).map_err(AetherError::Io)?;
                    }
                    WriteStrategy::Hardlink => {
                        fs::hard_link(&source, dest).or_else(|_| fs::copy(&source, dest).map(|_| ()))
                            .map_err(AetherError::Io)?;
                    }
                }
            }
        }
        cx.report(len, Some(len));
        Ok(len)
    }

    pub(crate) fn put(&self, loc: &Location, data: &[u8]) -> miette::Result<()> {
        let dest = self.resolve(loc);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(AetherError::Io)?;
        }
        fs::write(&dest, data).map_err(AetherError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_copy_into_memory() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        let transport = FileTransport::new(tmp.path());
        let mut buf = Vec::new();
        let n = transport
            .get(&Location("a.txt".into()), Sink::Memory(&mut buf), &Context::new())
            .unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn get_copy_to_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        let dest_dir = tempfile::tempdir().unwrap();
        let dest = dest_dir.path().join("out.txt");
        let transport = FileTransport::new(tmp.path());
        transport
            .get(&Location("a.txt".into()), Sink::Path(&dest), &Context::new())
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
    }

    #[test]
    fn get_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(tmp.path());
        let mut buf = Vec::new();
        let err = transport.get(&Location("missing.txt".into()), Sink::Memory(&mut buf), &Context::new());
        assert!(err.is_err());
    }

    #[test]
    fn peek_reports_existence() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"x").unwrap();
        let transport = FileTransport::new(tmp.path());
        assert!(transport.peek(&Location("a.txt".into())).unwrap());
        assert!(!transport.peek(&Location("b.txt".into())).unwrap());
    }

    #[test]
    fn put_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(tmp.path());
        transport
            .put(&Location("org/example/lib/1.0/lib-1.0.jar".into()), b"jar bytes")
            .unwrap();
        let path = tmp.path().join("org/example/lib/1.0/lib-1.0.jar");
        assert_eq!(fs::read(path).unwrap(), b"jar bytes");
    }
}
