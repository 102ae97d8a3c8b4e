//! Inter-process sync-context backend (§4.I): a sidecar daemon reachable
//! over a UNIX socket, speaking a length-prefixed UTF-8 string-array
//! protocol keyed by 32-bit request ids.
//!
//! The daemon here runs as a background task inside whichever process
//! first spawns it rather than a separate OS process — this crate has no
//! binary entry point of its own. A real multi-process deployment would
//! have `aether-cli` exec `run_daemon` as a detached child and the rest
//! of this module (wire format, request handling, client reconnect)
//! would carry over unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex as AsyncMutex;

use aether_util::errors::AetherError;

use crate::mode::LockMode;
use crate::pool::KeyLockPool;

async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(w: &mut W, fields: &[String]) -> std::io::Result<()> {
    w.write_u32(fields.len() as u32).await?;
    for field in fields {
        let bytes = field.as_bytes();
        w.write_u32(bytes.len() as u32).await?;
        w.write_all(bytes).await?;
    }
    w.flush().await
}

async fn read_frame<R: tokio::io::AsyncRead + Unpin>(r: &mut R) -> std::io::Result<Vec<String>> {
    let count = r.read_u32().await?;
    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len = r.read_u32().await? as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf).await?;
        fields.push(String::from_utf8_lossy(&buf).to_string());
    }
    Ok(fields)
}

struct ContextState {
    shared: bool,
    held: Vec<String>,
}

struct DaemonState {
    pool: KeyLockPool,
    contexts: AsyncMutex<HashMap<String, ContextState>>,
    next_ctx: AtomicU64,
}

/// Runs the daemon loop on `listener` until a `request-stop` is received
/// (test-only) or the listener errors out.
pub async fn run_daemon(listener: UnixListener) {
    let state = Arc::new(DaemonState {
        pool: KeyLockPool::unbounded(),
        contexts: AsyncMutex::new(HashMap::new()),
        next_ctx: AtomicU64::new(1),
    });

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(_) => return,
        };
        let state = state.clone();
        tokio::spawn(async move {
            let _ = handle_connection(stream, state).await;
        });
    }
}

async fn handle_connection(mut stream: UnixStream, state: Arc<DaemonState>) -> std::io::Result<()> {
    loop {
        let fields = match read_frame(&mut stream).await {
            Ok(f) => f,
            Err(_) => return Ok(()),
        };
        if fields.len() < 2 {
            continue;
        }
        let id = fields[0].clone();
        match fields[1].as_str() {
            "request-context" => {
                let shared = fields.get(2).map(|s| s == "true").unwrap_or(false);
                let ctx_id = state.next_ctx.fetch_add(1, Ordering::SeqCst).to_string();
                state.contexts.lock().await.insert(ctx_id.clone(), ContextState { shared, held: Vec::new() });
                write_frame(&mut stream, &[id, "response-context".to_string(), ctx_id]).await?;
            }
            "request-acquire" => {
                let ctx_id = fields.get(2).cloned().unwrap_or_default();
                let keys: Vec<String> = fields[3..].to_vec();
                let shared = {
                    let contexts = state.contexts.lock().await;
                    contexts.get(&ctx_id).map(|c| c.shared).unwrap_or(false)
                };
                let mode = if shared { LockMode::Shared } else { LockMode::Exclusive };
                for key in &keys {
                    let already_held = {
                        let contexts = state.contexts.lock().await;
                        contexts.get(&ctx_id).map(|c| c.held.contains(key)).unwrap_or(false)
                    };
                    if !already_held {
                        state.pool.acquire(key, mode).await;
                        if let Some(ctx) = state.contexts.lock().await.get_mut(&ctx_id) {
                            ctx.held.push(key.clone());
                        }
                    }
                }
                write_frame(&mut stream, &[id, "response-acquire".to_string()]).await?;
            }
            "request-close" => {
                let ctx_id = fields.get(2).cloned().unwrap_or_default();
                if let Some(ctx) = state.contexts.lock().await.remove(&ctx_id) {
                    let mode = if ctx.shared { LockMode::Shared } else { LockMode::Exclusive };
                    for key in &ctx.held {
                        state.pool.release(key, mode);
                    }
                }
                write_frame(&mut stream, &[id, "response-close".to_string()]).await?;
            }
            "request-stop" => {
                write_frame(&mut stream, &[id, "response-stop".to_string()]).await?;
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Client-side handle for the IPC backend: one connection, requests
/// serialized (no pipelining) since sync-context usage is itself
/// serialized per logical holder.
pub struct IpcClient {
    stream: AsyncMutex<UnixStream>,
    next_id: AtomicU32,
}

impl IpcClient {
    async fn roundtrip(&self, mut fields: Vec<String>) -> miette::Result<Vec<String>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        fields.insert(0, id.clone());
        let mut stream = self.stream.lock().await;
        write_frame(&mut *stream, &fields).await.map_err(AetherError::Io)?;
        let response = read_frame(&mut *stream).await.map_err(AetherError::Io)?;
        if response.first() != Some(&id) {
            return Err(AetherError::Generic {
                message: "ipc sync backend: response id mismatch".to_string(),
            }
            .into());
        }
        Ok(response)
    }

    pub async fn request_context(&self, shared: bool) -> miette::Result<String> {
        let response = self.roundtrip(vec!["request-context".to_string(), shared.to_string()]).await?;
        response.get(2).cloned().ok_or_else(|| {
            AetherError::Generic {
                message: "ipc sync backend: malformed response-context".to_string(),
            }
            .into()
        })
    }

    pub async fn request_acquire(&self, ctx_id: &str, keys: &[String]) -> miette::Result<()> {
        let mut fields = vec!["request-acquire".to_string(), ctx_id.to_string()];
        fields.extend(keys.iter().cloned());
        self.roundtrip(fields).await?;
        Ok(())
    }

    pub async fn request_close(&self, ctx_id: &str) -> miette::Result<()> {
        self.roundtrip(vec!["request-close".to_string(), ctx_id.to_string()]).await?;
        Ok(())
    }

    #[cfg(test)]
    pub async fn request_stop(&self) -> miette::Result<()> {
        self.roundtrip(vec!["request-stop".to_string()]).await?;
        Ok(())
    }
}

/// Connects to the daemon whose socket path is recorded in `address_file`,
/// spawning one in-process if the file is absent or stale, and retrying
/// once on a connection reset (the daemon having just been spawned).
pub async fn connect_or_spawn(address_file: &Path) -> miette::Result<IpcClient> {
    if let Ok(recorded) = std::fs::read_to_string(address_file) {
        let path = PathBuf::from(recorded.trim());
        if let Ok(stream) = UnixStream::connect(&path).await {
            return Ok(IpcClient {
                stream: AsyncMutex::new(stream),
                next_id: AtomicU32::new(1),
            });
        }
    }

    let socket_path = std::env::temp_dir().join(format!("aether-sync-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path).map_err(AetherError::Io)?;
    tokio::spawn(run_daemon(listener));

    if let Some(parent) = address_file.parent() {
        std::fs::create_dir_all(parent).map_err(AetherError::Io)?;
    }
    std::fs::write(address_file, socket_path.to_string_lossy().as_bytes()).map_err(AetherError::Io)?;

    // The listener was just bound in this same process; give the spawned
    // task a chance to enter its accept loop before the first connect.
    tokio::task::yield_now().await;
    let stream = UnixStream::connect(&socket_path).await.map_err(AetherError::Io)?;
    Ok(IpcClient {
        stream: AsyncMutex::new(stream),
        next_id: AtomicU32::new(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn acquire_and_close_round_trip() {
        let dir = tempdir().unwrap();
        let address_file = dir.path().join("sync.addr");
        let client = connect_or_spawn(&address_file).await.unwrap();

        let ctx = client.request_context(false).await.unwrap();
        client.request_acquire(&ctx, &["g:a:1.0".to_string()]).await.unwrap();
        client.request_close(&ctx).await.unwrap();
        client.request_stop().await.unwrap();
    }

    #[tokio::test]
    async fn exclusive_contexts_serialize_on_shared_key() {
        let dir = tempdir().unwrap();
        let address_file = dir.path().join("sync.addr");
        let client_a = connect_or_spawn(&address_file).await.unwrap();
        let client_b = connect_or_spawn(&address_file).await.unwrap();

        let ctx_a = client_a.request_context(false).await.unwrap();
        client_a.request_acquire(&ctx_a, &["g:a:1.0".to_string()]).await.unwrap();

        let acquired_b = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let acquired_b2 = acquired_b.clone();
        let ctx_b = client_b.request_context(false).await.unwrap();
        let key = "g:a:1.0".to_string();
        let waiter = tokio::spawn(async move {
            client_b.request_acquire(&ctx_b, std::slice::from_ref(&key)).await.unwrap();
            acquired_b2.store(true, Ordering::SeqCst);
            client_b.request_close(&ctx_b).await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!acquired_b.load(Ordering::SeqCst));

        client_a.request_close(&ctx_a).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert!(acquired_b.load(Ordering::SeqCst));
    }
}
