//! Sync contexts (§4.I): named, reentrant, shared/exclusive locks over
//! logical keys, backed by one of four interchangeable implementations.
//!
//! Mirrors the `aether_transport::transport::Transport` tagged-enum
//! style: the set of backends is fixed and known at compile time, so
//! dispatch is a `match` rather than a trait object.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use aether_util::errors::AetherError;

use crate::file_backend::{FileBackend, FileGuard};
use crate::ipc::IpcClient;
use crate::keymap::KeyMapper;
use crate::mode::LockMode;
use crate::pool::KeyLockPool;

enum Backend {
    RwLock(KeyLockPool),
    Semaphore(KeyLockPool),
    File(FileBackend),
    Ipc(IpcClient),
}

/// Process-local bookkeeping of who holds what, layered on top of every
/// backend so reentrancy and upgrade detection behave identically
/// regardless of which one is in play.
struct KeyState {
    mode: LockMode,
    holders: HashMap<u64, u32>,
}

struct OwnershipTable {
    keys: Mutex<HashMap<String, KeyState>>,
}

impl OwnershipTable {
    fn new() -> Self {
        Self { keys: Mutex::new(HashMap::new()) }
    }

    /// `Ok(true)` when this holder already owns the key at a compatible
    /// mode (reentrant, no backend call needed); `Ok(false)` when the
    /// caller must still go through the backend; `Err` on a forbidden
    /// shared-to-exclusive upgrade by the same holder.
    fn claim(&self, key: &str, holder: u64, mode: LockMode) -> miette::Result<bool> {
        let mut keys = self.keys.lock().unwrap();
        if let Some(state) = keys.get_mut(key) {
            if let Some(depth) = state.holders.get_mut(&holder) {
                if state.mode == LockMode::Shared && mode == LockMode::Exclusive {
                    return Err(AetherError::LockUpgradeNotSupported { key: key.to_string() }.into());
                }
                *depth += 1;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn record(&self, key: &str, holder: u64, mode: LockMode) {
        let mut keys = self.keys.lock().unwrap();
        let entry = keys.entry(key.to_string()).or_insert_with(|| KeyState { mode, holders: HashMap::new() });
        entry.mode = mode;
        entry.holders.insert(holder, 1);
    }

    /// Returns the mode this holder acquired the key at, once its own
    /// reentrant depth has fully unwound — the signal to release the
    /// underlying backend acquisition.
    fn release(&self, key: &str, holder: u64) -> Option<LockMode> {
        let mut keys = self.keys.lock().unwrap();
        if let Some(state) = keys.get_mut(key) {
            if let Some(depth) = state.holders.get_mut(&holder) {
                *depth -= 1;
                if *depth == 0 {
                    let mode = state.mode;
                    state.holders.remove(&holder);
                    if state.holders.is_empty() {
                        keys.remove(key);
                    }
                    return Some(mode);
                }
            }
        }
        None
    }
}

pub struct SyncContext {
    backend: Backend,
    key_mapper: KeyMapper,
    table: OwnershipTable,
    next_holder: AtomicU64,
}

impl SyncContext {
    pub fn in_process_rwlock(key_mapper: KeyMapper) -> Self {
        Self {
            backend: Backend::RwLock(KeyLockPool::unbounded()),
            key_mapper,
            table: OwnershipTable::new(),
            next_holder: AtomicU64::new(1),
        }
    }

    pub fn in_process_semaphore(max_shared: u32, key_mapper: KeyMapper) -> Self {
        Self {
            backend: Backend::Semaphore(KeyLockPool::bounded(max_shared)),
            key_mapper,
            table: OwnershipTable::new(),
            next_holder: AtomicU64::new(1),
        }
    }

    pub fn file_based(lock_dir: PathBuf, key_mapper: KeyMapper) -> miette::Result<Self> {
        Ok(Self {
            backend: Backend::File(FileBackend::new(lock_dir)?),
            key_mapper,
            table: OwnershipTable::new(),
            next_holder: AtomicU64::new(1),
        })
    }

    pub async fn ipc(address_file: PathBuf, key_mapper: KeyMapper) -> miette::Result<Self> {
        Ok(Self {
            backend: Backend::Ipc(crate::ipc::connect_or_spawn(&address_file).await?),
            key_mapper,
            table: OwnershipTable::new(),
            next_holder: AtomicU64::new(1),
        })
    }

    /// Opens a new logical lock holder. All keys acquired through it share
    /// `mode`; closing it releases every key it still holds.
    pub async fn new_lock_context(&self, mode: LockMode) -> miette::Result<LockContext<'_>> {
        let holder = self.next_holder.fetch_add(1, Ordering::SeqCst);
        self.new_lock_context_with_holder(holder, mode).await
    }

    /// Like [`Self::new_lock_context`], but under an explicit holder id
    /// so the same logical caller can open more than one context (e.g.
    /// a shared one followed by an exclusive one) and have the ownership
    /// table recognize them as the same holder — the case that must
    /// fail with `LockUpgradeNotSupported` rather than deadlock.
    pub async fn new_lock_context_with_holder(&self, holder: u64, mode: LockMode) -> miette::Result<LockContext<'_>> {
        let ipc_ctx_id = match &self.backend {
            Backend::Ipc(client) => Some(client.request_context(mode.is_shared()).await?),
            _ => None,
        };
        Ok(LockContext {
            ctx: self,
            mode,
            holder,
            held: Mutex::new(HashMap::new()),
            ipc_ctx_id,
            closed: false,
        })
    }

    pub fn new_holder_id(&self) -> u64 {
        self.next_holder.fetch_add(1, Ordering::SeqCst)
    }
}

enum HeldKey {
    Pool,
    File(FileGuard),
}

pub struct LockContext<'a> {
    ctx: &'a SyncContext,
    mode: LockMode,
    holder: u64,
    held: Mutex<HashMap<String, HeldKey>>,
    ipc_ctx_id: Option<String>,
    closed: bool,
}

impl<'a> LockContext<'a> {
    pub async fn acquire(&self, keys: &[impl AsRef<str>]) -> miette::Result<()> {
        let mapped: Vec<String> = keys.iter().map(|k| self.ctx.key_mapper.map(k.as_ref())).collect();

        if let Some(ctx_id) = &self.ipc_ctx_id {
            let Backend::Ipc(client) = &self.ctx.backend else { unreachable!() };
            client.request_acquire(ctx_id, &mapped).await?;
            return Ok(());
        }

        for key in &mapped {
            self.acquire_one(key).await?;
        }
        Ok(())
    }

    async fn acquire_one(&self, mapped: &str) -> miette::Result<()> {
        if self.ctx.table.claim(mapped, self.holder, self.mode)? {
            return Ok(());
        }
        match &self.ctx.backend {
            Backend::RwLock(pool) | Backend::Semaphore(pool) => {
                pool.acquire(mapped, self.mode).await;
                self.ctx.table.record(mapped, self.holder, self.mode);
                self.held.lock().unwrap().insert(mapped.to_string(), HeldKey::Pool);
            }
            Backend::File(file_backend) => {
                let guard = file_backend.acquire(mapped, self.mode).await?;
                self.ctx.table.record(mapped, self.holder, self.mode);
                self.held.lock().unwrap().insert(mapped.to_string(), HeldKey::File(guard));
            }
            Backend::Ipc(_) => unreachable!("ipc contexts short-circuit in acquire()"),
        }
        Ok(())
    }

    fn release_one(&self, mapped: &str) {
        let Some(mode) = self.ctx.table.release(mapped, self.holder) else {
            return;
        };
        match self.held.lock().unwrap().remove(mapped) {
            Some(HeldKey::Pool) => {
                if let Backend::RwLock(pool) | Backend::Semaphore(pool) = &self.ctx.backend {
                    pool.release(mapped, mode);
                }
            }
            Some(HeldKey::File(guard)) => guard.release(),
            None => {}
        }
    }

    /// Releases every key this context still holds.
    pub async fn close(mut self) -> miette::Result<()> {
        self.close_mut().await
    }

    async fn close_mut(&mut self) -> miette::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(ctx_id) = &self.ipc_ctx_id {
            let Backend::Ipc(client) = &self.ctx.backend else { unreachable!() };
            client.request_close(ctx_id).await?;
            return Ok(());
        }
        let keys: Vec<String> = self.held.lock().unwrap().keys().cloned().collect();
        for key in keys {
            self.release_one(&key);
        }
        Ok(())
    }
}

impl Drop for LockContext<'_> {
    fn drop(&mut self) {
        if self.closed || self.ipc_ctx_id.is_some() {
            return;
        }
        let keys: Vec<String> = self.held.lock().unwrap().keys().cloned().collect();
        for key in keys {
            self.release_one(&key);
        }
    }
}
