//! File-system lock backend: one `.lock` file per mapped key under a
//! shared lock directory, held via `fd-lock` advisory locks so multiple
//! OS processes sharing the same local artifact store serialize on it.
//!
//! `fd_lock`'s guards borrow the `RwLock<File>` they came from, which
//! doesn't fit a map keyed by logical name without self-referential
//! structures. Instead each acquisition spawns a dedicated blocking
//! thread that holds the guard for as long as the logical lock is held,
//! parked on a oneshot release signal — the same bridge pattern used to
//! expose any blocking RAII guard to async callers.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::mode::LockMode;
use aether_util::errors::AetherError;

pub struct FileBackend {
    lock_dir: PathBuf,
}

/// Holds the background thread alive; dropping (or releasing) signals it
/// to drop its `fd_lock` guard and exit.
pub struct FileGuard {
    release: Option<oneshot::Sender<()>>,
}

impl FileGuard {
    pub fn release(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

impl FileBackend {
    pub fn new(lock_dir: PathBuf) -> miette::Result<Self> {
        std::fs::create_dir_all(&lock_dir).map_err(AetherError::Io)?;
        Ok(Self { lock_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
        self.lock_dir.join(format!("{safe}.lock"))
    }

    pub async fn acquire(&self, key: &str, _mode: LockMode) -> miette::Result<FileGuard> {
        let path = self.path_for(key);
        let (ready_tx, ready_rx) = oneshot::channel::<std::io::Result<()>>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        // fd-lock only exposes a single advisory flock per file; we take
        // the exclusive OS lock for both shared and exclusive requests
        // and rely on the in-process ownership table (see `context.rs`)
        // to admit multiple same-process shared holders above it.
        std::thread::spawn(move || {
            let opened = OpenOptions::new().create(true).truncate(false).read(true).write(true).open(&path);
            let file = match opened {
                Ok(f) => f,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let mut rw = fd_lock::RwLock::new(file);
            let acquired = rw.write();
            match acquired {
                Ok(_guard) => {
                    // Signal readiness before parking on the release
                    // channel — the caller is awaiting `ready_rx` and
                    // will only ever release after receiving this.
                    let _ = ready_tx.send(Ok(()));
                    let _ = release_rx.blocking_recv();
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(FileGuard { release: Some(release_tx) }),
            Ok(Err(e)) => Err(AetherError::Io(e).into()),
            Err(_) => Err(AetherError::Generic {
                message: "file lock thread vanished before signalling readiness".to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn exclusive_lock_blocks_a_second_exclusive_acquirer() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(FileBackend::new(dir.path().to_path_buf()).unwrap());

        let first = backend.acquire("g:a:1.0", LockMode::Exclusive).await.unwrap();

        let backend2 = backend.clone();
        let second = tokio::spawn(async move { backend2.acquire("g:a:1.0", LockMode::Exclusive).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!second.is_finished());

        first.release();
        let guard = tokio::time::timeout(Duration::from_secs(2), second).await.unwrap().unwrap().unwrap();
        guard.release();
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().to_path_buf()).unwrap();
        let a = backend.acquire("g:a:1.0", LockMode::Exclusive).await.unwrap();
        let b = backend.acquire("g:b:1.0", LockMode::Exclusive).await.unwrap();
        a.release();
        b.release();
    }
}
