//! In-process keyed lock pool: a hand-rolled async reader/writer lock per
//! key, shared by the `RwLock` and `Semaphore` in-process backends. The
//! two differ only in how many concurrent shared holders a key admits —
//! unbounded for the `RwLock` flavour, capped at `max_shared` permits for
//! the `Semaphore` flavour — so one implementation covers both.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::mode::LockMode;

struct KeyState {
    readers: u32,
    writer: bool,
    notify: Arc<Notify>,
}

impl KeyState {
    fn new() -> Self {
        Self {
            readers: 0,
            writer: false,
            notify: Arc::new(Notify::new()),
        }
    }
}

pub struct KeyLockPool {
    max_shared: Option<u32>,
    keys: Mutex<HashMap<String, KeyState>>,
}

impl KeyLockPool {
    pub fn unbounded() -> Self {
        Self {
            max_shared: None,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn bounded(max_shared: u32) -> Self {
        Self {
            max_shared: Some(max_shared),
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn can_admit_shared(&self, state: &KeyState) -> bool {
        if state.writer {
            return false;
        }
        match self.max_shared {
            Some(max) => state.readers < max,
            None => true,
        }
    }

    pub async fn acquire(&self, key: &str, mode: LockMode) {
        loop {
            // Safety against the classic Notify race: lock the table,
            // decide, and only await `notified()` after dropping the
            // guard — `Notify::notify_waiters` wakes anyone already
            // parked, and a fresh registration after the check always
            // re-observes current state on the next loop iteration.
            {
                let mut keys = self.keys.lock().unwrap();
                let state = keys.entry(key.to_string()).or_insert_with(KeyState::new);
                match mode {
                    LockMode::Shared => {
                        if self.can_admit_shared(state) {
                            state.readers += 1;
                            return;
                        }
                    }
                    LockMode::Exclusive => {
                        if !state.writer && state.readers == 0 {
                            state.writer = true;
                            return;
                        }
                    }
                }
            }
            self.wait_for(key).await;
        }
    }

    async fn wait_for(&self, key: &str) {
        // Re-borrow to obtain a `notified()` future tied to this key's
        // `Notify`, scoped so the std mutex guard is dropped before the
        // await point.
        let notify = {
            let keys = self.keys.lock().unwrap();
            keys.get(key).map(|s| s.notify.clone())
        };
        match notify {
            Some(notify) => notify.notified().await,
            None => tokio::task::yield_now().await,
        }
    }

    pub fn release(&self, key: &str, mode: LockMode) {
        let mut keys = self.keys.lock().unwrap();
        if let Some(state) = keys.get_mut(key) {
            match mode {
                LockMode::Shared => state.readers = state.readers.saturating_sub(1),
                LockMode::Exclusive => state.writer = false,
            }
            state.notify.notify_waiters();
        }
    }
}
