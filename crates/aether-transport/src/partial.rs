//! Partial file & resume protocol (§4.D.3): downloads land in
//! `<target>.part` guarded by an advisory lock file `<target>.part.lock`,
//! so concurrent processes racing to fetch the same URL cooperate instead
//! of corrupting each other's output.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use aether_util::errors::AetherError;

use crate::transport::{Context, Location, Sink, Transport};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_LOCK_ATTEMPTS: u32 = 64;

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// The bytes already on disk before this call's transfer began, so the
/// caller can replay them through a [`crate::checksum::ChecksumCalculator`]
/// instead of re-hashing the whole final file from scratch.
pub struct Resumed {
    pub total_len: u64,
    /// `Some(offset)` when the final file already had `offset` bytes on
    /// disk before this call (a pre-existing target, or a `.part` this
    /// call resumed); `None` for a download that started at byte 0.
    pub resumed_from: Option<u64>,
}

/// Download `loc` to `dest` through the partial-file protocol, resuming
/// an in-progress `.part` file when one already holds the lock.
///
/// Returns the final file size. At most one process ever writes
/// `<dest>.part`; the lock file is removed on normal completion.
pub async fn get_resumable(
    transport: &Transport,
    loc: &Location,
    dest: &Path,
    request_timeout: Duration,
    cx: &Context,
) -> miette::Result<Resumed> {
    let part_path = sibling(dest, ".part");
    let lock_path = sibling(dest, ".part.lock");

    for _ in 0..MAX_LOCK_ATTEMPTS {
        if dest.is_file() {
            let len = dest.metadata().map_err(AetherError::Io)?.len();
            return Ok(Resumed { total_len: len, resumed_from: Some(0) });
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(AetherError::Io)?;
        let mut rw = fd_lock::RwLock::new(lock_file);
        let lock_result = rw.try_write();

        match lock_result {
            Ok(_guard) => {
                let offset = part_path.metadata().map(|m| m.len()).unwrap_or(0);
                let total = transport.get(loc, Sink::Path(&part_path), offset, cx).await?;
                fs::rename(&part_path, dest).map_err(AetherError::Io)?;
                let _ = fs::remove_file(&lock_path);
                return Ok(Resumed {
                    total_len: total,
                    resumed_from: if offset > 0 { Some(offset) } else { None },
                });
            }
            Err(_) => {
                match wait_for_peer(transport, loc, cx, &lock_path, &part_path, dest, request_timeout).await? {
                    PeerOutcome::Completed(len) => return Ok(Resumed { total_len: len, resumed_from: Some(0) }),
                    PeerOutcome::Retry => continue,
                }
            }
        }
    }

    Err(AetherError::Timeout {
        what: format!("waiting for partial-file lock on {}", dest.display()),
        millis: request_timeout.as_millis() as u64,
    }
    .into())
}

enum PeerOutcome {
    Completed(u64),
    Retry,
}

/// Blocks (bounded by `request_timeout`) on the peer holding the
/// exclusive lock, watching the `.part` file's mtime to distinguish a
/// live writer from a crashed one.
async fn wait_for_peer(
    transport: &Transport,
    loc: &Location,
    cx: &Context,
    lock_path: &Path,
    part_path: &Path,
    dest: &Path,
    request_timeout: Duration,
) -> miette::Result<PeerOutcome> {
    let start = Instant::now();
    let mut last_mtime = part_mtime(part_path);

    loop {
        if dest.is_file() {
            // The peer's completed file exists locally, but this process
            // never itself authenticated against `loc` — re-check access
            // before handing the caller a result it never fetched.
            if !transport.peek(loc, cx).await? {
                return Err(AetherError::NotFound {
                    coordinate: dest.display().to_string(),
                    repo_id: "<peer>".to_string(),
                    url: loc.0.clone(),
                }
                .into());
            }
            let len = dest.metadata().map_err(AetherError::Io)?.len();
            return Ok(PeerOutcome::Completed(len));
        }
        if start.elapsed() > request_timeout {
            return Err(AetherError::Timeout {
                what: format!("waiting for peer download of {}", dest.display()),
                millis: request_timeout.as_millis() as u64,
            }
            .into());
        }

        tokio::time::sleep(POLL_INTERVAL).await;

        let mtime = part_mtime(part_path);
        if mtime != last_mtime {
            last_mtime = mtime;
            continue;
        }

        // mtime hasn't advanced: the peer may have died holding the
        // lock file but not the `.part`. Probe the lock directly; if it
        // is free now, let the caller retry acquisition from step 1.
        if let Ok(lock_file) = OpenOptions::new().write(true).open(lock_path) {
            let mut rw = fd_lock::RwLock::new(lock_file);
            if rw.try_write().is_ok() {
                return Ok(PeerOutcome::Retry);
            }
        }
    }
}

fn part_mtime(path: &Path) -> Option<std::time::SystemTime> {
    path.metadata().ok().and_then(|m| m.modified().ok())
}
