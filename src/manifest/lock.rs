//! Per-directory mutual exclusion for manifest rendering
//!
//! Two generations targeting the same directory would overwrite each other's
//! `kustomization.yaml` mid-render. [`DirLocks`] hands out one lock per
//! canonical directory path; unrelated directories never contend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of locks keyed by canonical directory path
#[derive(Debug, Default)]
pub struct DirLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        let key = dunce::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }

    /// Run `f` while holding the lock of `dir`
    ///
    /// The lock is released when `f` returns, whether it succeeded, failed or
    /// panicked. A panic in a previous holder does not poison later callers.
    pub fn with_lock<T>(&self, dir: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(dir);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
