//! Named, reentrant, shared/exclusive locking (§4.I): the in-process
//! `RwLock`, in-process `Semaphore`, file-system, and IPC-daemon backends
//! selected behind one `SyncContext` API, with pluggable key mapping.

pub mod context;
pub mod file_backend;
pub mod ipc;
pub mod keymap;
pub mod mode;
pub mod pool;

pub use context::{LockContext, SyncContext};
pub use keymap::KeyMapper;
pub use mode::LockMode;
