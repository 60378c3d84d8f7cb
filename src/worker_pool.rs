//! Bounded worker pool: accelerates embarrassingly parallel per-cycle
//! work (node/job array duplication, independent-node eligibility
//! filtering) without requiring the caller to reason about threads.
//!
//! A `work_queue`/`result_queue` pair guarded by one `Mutex`, workers
//! blocking on a `Condvar`, a `threads_die` flag broadcast at shutdown, and
//! chunking bounded by `MT_CHUNK_SIZE_MIN..MT_CHUNK_SIZE_MAX` so no single
//! shard dominates wall-clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Smallest and largest number of input items handed to one worker as a
/// single shard.
pub const MT_CHUNK_SIZE_MIN: usize = 10;
pub const MT_CHUNK_SIZE_MAX: usize = 100;

thread_local! {
    static WORKER_ID: std::cell::Cell<Option<usize>> = const { std::cell::Cell::new(None) };
}

/// Returns this thread's pool-assigned id, if it is a pool worker.
pub fn worker_id() -> Option<usize> {
    WORKER_ID.with(|id| id.get())
}

struct Shared<T> {
    queue: Mutex<Vec<T>>,
    condvar: Condvar,
    threads_die: std::sync::atomic::AtomicBool,
}

/// A bounded pool of worker threads that drains a shared work queue,
/// applies one closure to every item, and collects results without
/// preserving submission order.
pub struct WorkerPool {
    size: usize,
}

/// Splits `items` into shards of between `MT_CHUNK_SIZE_MIN` and
/// `MT_CHUNK_SIZE_MAX` items, aiming for one shard per worker when the
/// input is large enough to support it.
pub fn chunk_for_workers<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let target = (items.len() / workers.max(1)).clamp(MT_CHUNK_SIZE_MIN, MT_CHUNK_SIZE_MAX);
    let mut chunks = Vec::new();
    let mut iter = items.into_iter();
    loop {
        let chunk: Vec<T> = iter.by_ref().take(target).collect();
        if chunk.is_empty() {
            break;
        }
        let exhausted = chunk.len() < target;
        chunks.push(chunk);
        if exhausted {
            break;
        }
    }
    chunks
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        WorkerPool { size: size.max(1) }
    }

    /// Runs `f` over every item in `items`, parallelized across shards of
    /// the pool's size. Commutative on disjoint shards: callers must not
    /// depend on result ordering.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let shards = chunk_for_workers(items, self.size);
        if shards.is_empty() {
            return Vec::new();
        }

        let shared: Arc<Shared<Vec<T>>> = Arc::new(Shared {
            queue: Mutex::new(shards),
            condvar: Condvar::new(),
            threads_die: std::sync::atomic::AtomicBool::new(false),
        });
        let results: Arc<Mutex<Vec<R>>> = Arc::new(Mutex::new(Vec::new()));
        let f = Arc::new(f);
        let next_id = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..self.size.min(shared.queue.lock().unwrap().len().max(1)) {
                let shared = Arc::clone(&shared);
                let results = Arc::clone(&results);
                let f = Arc::clone(&f);
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                scope.spawn(move || {
                    WORKER_ID.with(|w| w.set(Some(id)));
                    loop {
                        let mut queue = shared.queue.lock().unwrap();
                        while queue.is_empty() && !shared.threads_die.load(Ordering::Relaxed) {
                            queue = shared.condvar.wait(queue).unwrap();
                        }
                        let Some(shard) = queue.pop() else { break };
                        drop(queue);

                        let shard_results: Vec<R> = shard.into_iter().map(|item| f(item)).collect();
                        results.lock().unwrap().extend(shard_results);
                    }
                });
            }
            shared.threads_die.store(true, Ordering::Relaxed);
            shared.condvar.notify_all();
        });

        Arc::try_unwrap(results).ok().map(|m| m.into_inner().unwrap()).unwrap_or_default()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}
