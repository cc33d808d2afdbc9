//! Per-invocation run state shared by the filter pipeline and the workers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

/// Counters and flags for one command invocation.
///
/// Constructed once per run and handed to every component by reference
/// (usually inside an `Arc`), so no state outlives the invocation.
#[derive(Debug)]
pub struct Session {
    run_id: Uuid,
    transferred: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    unauthorized: AtomicBool,
    reserved_paths: Mutex<HashSet<PathBuf>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            run_id: Uuid::new_v4(),
            transferred: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unauthorized: AtomicBool::new(false),
            reserved_paths: Mutex::new(HashSet::new()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_transferred(&self) {
        self.transferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Marks the run as unauthorised. Tasks still queued see this and stop early.
    pub fn mark_unauthorized(&self) {
        self.unauthorized.store(true, Ordering::SeqCst);
    }

    pub fn is_unauthorized(&self) -> bool {
        self.unauthorized.load(Ordering::SeqCst)
    }

    /// Claims `path` for this run. Returns false if another task already did.
    ///
    /// Best effort only: it guards against two tasks of the same run resolving
    /// to one target, not against other processes touching the file.
    pub fn reserve_path(&self, path: &Path) -> bool {
        match self.reserved_paths.lock() {
            Ok(mut reserved) => reserved.insert(path.to_path_buf()),
            Err(poisoned) => poisoned.into_inner().insert(path.to_path_buf()),
        }
    }
}
