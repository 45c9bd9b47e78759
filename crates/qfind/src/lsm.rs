//! Incremental update pipeline: two pending batches (adds, deletes) fed by
//! filesystem events, a background committer that seals them on a deadline
//! or when a batch fills, and a watcher bridge that turns change
//! notifications into enqueued operations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use notify::{RecursiveMode, Watcher as _};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::index::Index;
use crate::types::FileId;

/// A batch may lag this many commit triggers behind before enqueue starts
/// reporting `Busy`.
const PENDING_CAP_FACTOR: usize = 64;

#[derive(Debug)]
pub(crate) struct QueuedOp {
    pub(crate) id: FileId,
    pub(crate) path: PathBuf,
}

/// Pending batches plus the committer wake-up signal. Payloads are immutable
/// once pushed; only the vectors themselves are guarded.
pub(crate) struct UpdateQueues {
    adds: Mutex<Vec<QueuedOp>>,
    dels: Mutex<Vec<QueuedOp>>,
    signal: Condvar,
    signal_lock: Mutex<()>,
}

impl UpdateQueues {
    pub(crate) fn new() -> Self {
        UpdateQueues {
            adds: Mutex::new(Vec::new()),
            dels: Mutex::new(Vec::new()),
            signal: Condvar::new(),
            signal_lock: Mutex::new(()),
        }
    }

    fn push(
        batch: &Mutex<Vec<QueuedOp>>,
        signal: &Condvar,
        id: FileId,
        path: PathBuf,
        batch_size: usize,
    ) -> Result<()> {
        let mut guard = batch.lock();
        if guard.len() >= batch_size.saturating_mul(PENDING_CAP_FACTOR) {
            return Err(Error::Busy);
        }
        guard.push(QueuedOp { id, path });
        let full = guard.len() >= batch_size;
        drop(guard);
        if full {
            signal.notify_all();
        }
        Ok(())
    }

    pub(crate) fn push_add(&self, id: FileId, path: PathBuf, batch_size: usize) -> Result<()> {
        Self::push(&self.adds, &self.signal, id, path, batch_size)
    }

    pub(crate) fn push_del(&self, id: FileId, path: PathBuf, batch_size: usize) -> Result<()> {
        Self::push(&self.dels, &self.signal, id, path, batch_size)
    }

    /// Swap both batches out, leaving fresh empty ones for producers.
    pub(crate) fn drain(&self) -> (Vec<QueuedOp>, Vec<QueuedOp>) {
        let adds = std::mem::take(&mut *self.adds.lock());
        let dels = std::mem::take(&mut *self.dels.lock());
        (adds, dels)
    }
}

/// Background committer thread. Wakes on the batch-full signal or after the
/// configured deadline, and commits whatever is pending. A final commit
/// drains stragglers on shutdown.
pub struct Committer {
    running: Arc<AtomicBool>,
    index: Arc<Index>,
    handle: Option<JoinHandle<()>>,
}

impl Committer {
    pub fn spawn(index: Arc<Index>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let worker_index = index.clone();
        let handle = std::thread::spawn(move || {
            let interval = worker_index.config().commit_interval;
            while flag.load(Ordering::Relaxed) {
                {
                    let mut guard = worker_index.queues.signal_lock.lock();
                    let _ = worker_index
                        .queues
                        .signal
                        .wait_for(&mut guard, interval);
                }
                if !flag.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(err) = worker_index.commit() {
                    error!(error = %err, "background commit failed");
                }
            }
            debug!("committer exiting");
        });
        Committer {
            running,
            index,
            handle: Some(handle),
        }
    }

    /// Stop the worker and apply any remaining pending changes.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        self.index.queues.signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            if let Err(err) = self.index.commit() {
                error!(error = %err, "final commit failed");
            }
        }
    }
}

impl Drop for Committer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bridges filesystem change notifications to the update queues:
/// create/move-in becomes an add, delete/move-out becomes a delete.
pub struct FsWatcher {
    watcher: Option<notify::RecommendedWatcher>,
    handle: Option<JoinHandle<()>>,
}

impl FsWatcher {
    pub fn spawn(index: Arc<Index>, roots: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(io_other)?;
        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive).map_err(io_other)?;
        }
        let handle = std::thread::spawn(move || {
            for res in rx {
                match res {
                    Ok(event) => dispatch(&index, event),
                    Err(err) => warn!(error = %err, "watch stream error"),
                }
            }
            debug!("watcher bridge exiting");
        });
        Ok(FsWatcher {
            watcher: Some(watcher),
            handle: Some(handle),
        })
    }
}

impl Drop for FsWatcher {
    fn drop(&mut self) {
        // Dropping the watcher closes the event channel and ends the bridge.
        self.watcher.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn io_other(err: notify::Error) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
}

fn dispatch(index: &Index, event: notify::Event) {
    use notify::event::{ModifyKind, RenameMode};
    use notify::EventKind;

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            for path in &event.paths {
                enqueue_add(index, path);
            }
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                enqueue_del(index, path);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                enqueue_del(index, from);
                enqueue_add(index, to);
            }
        }
        _ => {}
    }
}

fn enqueue_add(index: &Index, path: &Path) {
    match index.enqueue_add(path) {
        Ok(()) => {}
        Err(Error::Busy) => warn!(path = %path.display(), "add dropped, batch full"),
        Err(err) => warn!(path = %path.display(), error = %err, "enqueue add failed"),
    }
}

fn enqueue_del(index: &Index, path: &Path) {
    match index.enqueue_del(path) {
        Ok(()) => {}
        // Deletes of paths the index never saw are routine churn.
        Err(Error::NotFound(_)) => debug!(path = %path.display(), "delete of unindexed path"),
        Err(err) => warn!(path = %path.display(), error = %err, "enqueue delete failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn small_config() -> Config {
        Config {
            bloom_primary_bytes: 1 << 14,
            bloom_secondary_bytes: 1 << 13,
            lsm_batch_size: 4,
            ..Config::default()
        }
    }

    #[test]
    fn drain_swaps_batches() {
        let idx = Index::new(small_config());
        idx.enqueue_add(Path::new("/q/a")).unwrap();
        idx.enqueue_add(Path::new("/q/b")).unwrap();
        let (adds, dels) = idx.queues.drain();
        assert_eq!(adds.len(), 2);
        assert!(dels.is_empty());
        let (again, _) = idx.queues.drain();
        assert!(again.is_empty());
    }

    #[test]
    fn busy_when_batch_is_saturated() {
        let idx = Index::new(small_config());
        let cap = 4 * PENDING_CAP_FACTOR;
        for i in 0..cap {
            idx.enqueue_add(Path::new(&format!("/q/f{}", i))).unwrap();
        }
        let err = idx.enqueue_add(Path::new("/q/overflow")).unwrap_err();
        assert!(matches!(err, Error::Busy));
    }

    #[test]
    fn committer_applies_pending_adds() {
        let idx = Arc::new(Index::new(small_config()));
        for i in 0..4 {
            let id = idx.alloc_id();
            idx.add_file(Path::new(&format!("/lsm/seed{}.txt", i)), id)
                .unwrap();
        }
        idx.commit().unwrap();
        let committer = Committer::spawn(idx.clone());
        idx.enqueue_add(Path::new("/lsm/pending.log")).unwrap();
        committer.stop();
        let q = crate::types::QueryCtx::literal("pending", 0, 0);
        assert_eq!(idx.search(&q).unwrap().len(), 1);
    }
}
