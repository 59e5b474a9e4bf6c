//! Media-engine worker pool.
//!
//! A fixed-size pool of opaque engine execution contexts. Each new
//! room is assigned a worker round-robin at creation and keeps that
//! binding for its whole lifetime; there is no rebalancing.
//!
//! Worker liveness is explicit state: a dead worker makes every
//! provider call for rooms pinned to it fail with a recoverable
//! degraded-room error, and assignment skips dead workers while a
//! live one remains.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Handle to one media-engine worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: usize,
    live: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn new(id: usize) -> Self {
        Self {
            id,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Pool index of this worker.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the worker is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Mark the worker as dead. Rooms pinned to it become degraded.
    pub fn mark_dead(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            warn!(
                target: "rc.media.worker",
                worker_id = self.id,
                "Worker marked dead, pinned rooms are degraded"
            );
        }
    }
}

/// Fixed-size worker pool with round-robin assignment.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    cursor: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool of `size` workers. A zero size is clamped to one.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            workers: (0..size).map(WorkerHandle::new).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the pool is empty (never true; pools hold at least one
    /// worker).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Assign the next worker in round-robin order.
    ///
    /// Dead workers are skipped while at least one live worker
    /// remains; with every worker dead the plain round-robin pick is
    /// returned and provider calls will surface the failure.
    #[must_use]
    pub fn assign(&self) -> WorkerHandle {
        for _ in 0..self.workers.len() {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.workers.len();
            if let Some(worker) = self.workers.get(index) {
                if worker.is_live() {
                    return worker.clone();
                }
            }
        }

        let index = self.cursor.load(Ordering::SeqCst) % self.workers.len();
        self.workers
            .get(index)
            .cloned()
            .unwrap_or_else(|| WorkerHandle::new(0))
    }

    /// Look up a worker by pool index.
    #[must_use]
    pub fn worker(&self, index: usize) -> Option<&WorkerHandle> {
        self.workers.get(index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn assignment_cycles_with_pool_period() {
        let pool = WorkerPool::new(2);
        let ids: Vec<usize> = (0..6).map(|_| pool.assign().id()).collect();
        assert_eq!(ids, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn single_worker_pool_always_assigns_it() {
        let pool = WorkerPool::new(1);
        assert_eq!(pool.assign().id(), 0);
        assert_eq!(pool.assign().id(), 0);
    }

    #[test]
    fn zero_size_clamps_to_one() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn dead_worker_is_skipped() {
        let pool = WorkerPool::new(3);
        pool.worker(1).unwrap().mark_dead();

        let ids: Vec<usize> = (0..4).map(|_| pool.assign().id()).collect();
        assert!(!ids.contains(&1), "dead worker must not be assigned: {ids:?}");
    }

    #[test]
    fn liveness_is_shared_across_clones() {
        let pool = WorkerPool::new(1);
        let assigned = pool.assign();
        assert!(assigned.is_live());

        pool.worker(0).unwrap().mark_dead();
        assert!(!assigned.is_live());
    }
}
