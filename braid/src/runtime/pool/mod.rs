//! Work-stealing thread pool.
//!
//! The pool is the concrete "external collaborator" the policies and the
//! scheduler rely on. It offers exactly what they need:
//!
//! - [`ThreadPool::enqueue`] to resume a handle on a worker,
//! - [`ThreadPool::resolve`] to complete a promise from a worker,
//! - [`ThreadPool::current`] and [`ThreadPool::is_current`] to query the pool
//!   of the calling thread,
//! - [`ThreadPool::has_local_work`] to back `can_block` decisions.

mod worker;

use crate::awaiter::{Handle, Resumable};
use crate::error::{Error, Result};
use crate::future::Promise;
use crate::runtime::context::{WorkerContext, enter_context, with_worker};
use crate::runtime::work_stealing::injector::Injector;
use crate::runtime::work_stealing::queue::LocalQueue;

use worker::Worker;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// State shared by the workers of a pool.
pub(crate) struct PoolCore {
    /// Global injector queue shared by all workers.
    pub(crate) injector: Injector,

    /// One local queue per worker.
    pub(crate) locals: Arc<Vec<Arc<LocalQueue>>>,
}

/// State owned by the user-facing handles of a pool.
///
/// Dropping the last [`ThreadPool`] drops this, which shuts the workers
/// down and joins them.
pub(crate) struct PoolShared {
    id: usize,
    core: Arc<PoolCore>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to a work-stealing thread pool.
///
/// Cloning the handle is cheap; the pool shuts down once every handle is
/// dropped. Handles still queued at that point are failed with
/// [`Error::Canceled`] without running.
#[derive(Clone)]
pub struct ThreadPool {
    shared: Arc<PoolShared>,
}

impl ThreadPool {
    /// Creates a pool with `threads` workers.
    ///
    /// See [`PoolBuilder`](crate::runtime::PoolBuilder) for more options.
    pub fn new(threads: usize) -> Self {
        super::PoolBuilder::new().worker_threads(threads).build()
    }

    pub(crate) fn start(threads: usize, name: &str) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        let locals: Vec<_> = (0..threads).map(|_| Arc::new(LocalQueue::new())).collect();
        let core = Arc::new(PoolCore {
            injector: Injector::new(),
            locals: Arc::new(locals),
        });

        let shared = Arc::new(PoolShared {
            id,
            core: core.clone(),
            handles: Mutex::new(Vec::with_capacity(threads)),
        });

        let mut handles = Vec::with_capacity(threads);

        for worker_id in 0..threads {
            let worker = Worker::new(worker_id, core.clone());
            let context = WorkerContext {
                pool: Arc::downgrade(&shared),
                id: worker_id,
                locals: core.locals.clone(),
            };

            let spawned = thread::Builder::new()
                .name(format!("{name}-{worker_id}"))
                .spawn(move || enter_context(context, || worker.run()));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => tracing::error!(%error, worker_id, "failed to spawn pool worker"),
            }
        }

        tracing::debug!(pool = id, workers = handles.len(), "thread pool started");

        *shared.handles.lock().unwrap_or_else(|e| e.into_inner()) = handles;

        Self { shared }
    }

    /// Returns the pool the current thread belongs to, if any.
    pub fn current() -> Option<ThreadPool> {
        with_worker(|worker| {
            worker
                .and_then(|w| w.pool.upgrade())
                .map(|shared| ThreadPool { shared })
        })
    }

    /// Returns `true` if the current thread is one of this pool's workers.
    pub fn is_current(&self) -> bool {
        with_worker(|worker| {
            worker.is_some_and(|w| std::ptr::eq(w.pool.as_ptr(), Arc::as_ptr(&self.shared)))
        })
    }

    /// Returns `true` if the current worker already has queued handles.
    ///
    /// Always `false` on threads outside the pool.
    pub fn has_local_work(&self) -> bool {
        if !self.is_current() {
            return false;
        }

        with_worker(|worker| worker.is_some_and(|w| !w.locals[w.id].is_empty()))
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.core.locals.len()
    }

    /// Enqueues `handle` for resumption on one of the workers.
    ///
    /// From a worker of this pool the handle goes to the worker's local
    /// queue; from anywhere else it goes through the global injector. After
    /// shutdown the handle is failed with [`Error::Canceled`].
    pub fn enqueue(&self, handle: Handle) {
        let core = &self.shared.core;

        if core.injector.is_shutdown() {
            handle.fail(Error::Canceled);
            return;
        }

        let local = self.is_current() && {
            with_worker(|worker| {
                if let Some(w) = worker {
                    w.locals[w.id].push(handle.clone());
                    true
                } else {
                    false
                }
            })
        };

        if local {
            core.injector.notify();
        } else {
            core.injector.push(handle);
        }
    }

    /// Runs a plain closure on one of the workers.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Arc::new(Job::new(f)));
    }

    /// Completes `promise` with `result` from one of the workers.
    ///
    /// Consumers resumed by the completion therefore run on the pool.
    pub fn resolve<T>(&self, promise: Promise<T>, result: Result<T>)
    where
        T: Send + 'static,
    {
        self.spawn(move || {
            promise.complete(result);
        });
    }

    /// Stops accepting work and wakes every worker so that it exits.
    ///
    /// Workers are joined when the last handle is dropped.
    pub fn shutdown(&self) {
        self.shared.core.injector.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("id", &self.shared.id)
            .field("workers", &self.worker_count())
            .finish()
    }
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        self.core.injector.shutdown();

        let current = thread::current().id();
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        for handle in handles {
            // The last handle may be released by one of the workers.
            if handle.thread().id() == current {
                continue;
            }

            let _ = handle.join();
        }

        let mut leftover = self.core.injector.drain();
        for local in self.core.locals.iter() {
            leftover.extend(local.drain());
        }

        let leftover_count = leftover.len();
        for handle in leftover {
            handle.fail(Error::Canceled);
        }

        tracing::debug!(pool = self.id, leftover = leftover_count, "thread pool stopped");
    }
}

/// A plain closure wrapped as a resumable handle.
struct Job {
    f: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Job {
    fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            f: Mutex::new(Some(Box::new(f))),
        }
    }
}

impl Resumable for Job {
    fn resume(self: Arc<Self>) {
        let f = self.f.lock().unwrap_or_else(|e| e.into_inner()).take();

        if let Some(f) = f {
            f();
        }
    }
}
