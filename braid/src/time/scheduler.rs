use super::Ident;
use super::entry::Entry;
use crate::error::{Error, Result};
use crate::future::{self, Deferred, Promise};
use crate::generator::{Co, Generator};
use crate::runtime::ThreadPool;

use std::collections::BinaryHeap;
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Heap {
    entries: BinaryHeap<Entry>,
    /// Bumped on every change a waiting loop must look at.
    generation: u64,
    stopped: bool,
}

struct Inner {
    heap: Mutex<Heap>,
    changed: Condvar,
    seq: AtomicU64,
    pool: Mutex<Option<ThreadPool>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn perturb(&self, heap: &mut Heap) {
        heap.generation = heap.generation.wrapping_add(1);
        self.changed.notify_all();
    }

    fn schedule(&self, ident: Ident, promise: Promise<()>, deadline: Instant) {
        let mut heap = self.lock();

        if heap.stopped {
            drop(heap);
            promise.set_error(Error::Canceled);
            return;
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        heap.entries.push(Entry {
            deadline,
            seq,
            promise,
            ident,
        });

        tracing::trace!(?ident, "scheduler entry added");
        self.perturb(&mut heap);
    }

    fn sleep_until(&self, deadline: Instant, ident: Ident) -> Deferred<()> {
        let (promise, deferred) = future::pair();
        self.schedule(ident, promise, deadline);
        deferred
    }

    fn cancel_with(&self, ident: Ident, error: Error) -> bool {
        let removed = {
            let mut heap = self.lock();
            let mut entries = std::mem::take(&mut heap.entries).into_vec();

            let first = entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.ident == ident)
                .max_by(|(_, a), (_, b)| a.cmp(b))
                .map(|(index, _)| index);

            let removed = first.map(|index| entries.swap_remove(index));
            heap.entries = BinaryHeap::from(entries);

            if removed.is_some() {
                self.perturb(&mut heap);
            }

            removed
        };

        match removed {
            Some(entry) => {
                tracing::trace!(?ident, "scheduler entry canceled");
                entry.promise.set_error(error);
                true
            }
            None => false,
        }
    }

    /// Completes `expired` outside the heap lock.
    fn fire(&self, expired: Vec<Entry>) {
        let pool = self.pool.lock().unwrap_or_else(|e| e.into_inner()).clone();

        for entry in expired {
            match &pool {
                Some(pool) => pool.resolve(entry.promise, Ok(())),
                None => {
                    entry.promise.set_value(());
                }
            }
        }
    }

    /// Services the heap until stopped or until `until` reports `true`.
    ///
    /// `until` runs first and again after every perturbation of the heap.
    fn drive(&self, mut until: impl FnMut() -> bool) {
        let mut seen = self.lock().generation;

        loop {
            if until() {
                return;
            }

            let expired = {
                let mut heap = self.lock();
                if heap.stopped {
                    return;
                }

                let now = Instant::now();
                let mut expired = Vec::new();

                while heap.entries.peek().is_some_and(|top| top.deadline <= now) {
                    if let Some(entry) = heap.entries.pop() {
                        expired.push(entry);
                    }
                }

                expired
            };

            if !expired.is_empty() {
                tracing::trace!(count = expired.len(), "scheduler entries expired");
                self.fire(expired);
                continue;
            }

            let mut heap = self.lock();

            if heap.stopped {
                return;
            }

            if heap.generation != seen {
                seen = heap.generation;
                continue;
            }

            match heap.entries.peek().map(|top| top.deadline) {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    let (guard, _) = self
                        .changed
                        .wait_timeout(heap, timeout)
                        .unwrap_or_else(|e| e.into_inner());
                    heap = guard;
                }
                None => {
                    heap = self.changed.wait(heap).unwrap_or_else(|e| e.into_inner());
                }
            }

            seen = heap.generation;
        }
    }

    /// Stops every loop and cancels every entry.
    fn stop(&self) -> usize {
        let entries = {
            let mut heap = self.lock();
            heap.stopped = true;
            self.perturb(&mut heap);
            std::mem::take(&mut heap.entries).into_vec()
        };

        let canceled = entries.len();
        for entry in entries {
            entry.promise.set_error(Error::Canceled);
        }

        canceled
    }
}

async fn ticks(inner: Arc<Inner>, co: Co<Instant>, base: Instant, period: Duration) -> Result<()> {
    let mut tick = base;

    loop {
        tick += period;

        if tick > Instant::now() {
            inner.sleep_until(tick, Ident::NONE).await?;
        }

        co.yield_(tick).await;
    }
}

/// Wakes a foreground loop when the `until` future makes progress.
struct LoopWaker {
    inner: Weak<Inner>,
}

impl Wake for LoopWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if let Some(inner) = self.inner.upgrade() {
            let mut heap = inner.lock();
            inner.perturb(&mut heap);
        }
    }
}

/// Time-ordered delivery of completions.
///
/// Entries wait in a min-heap keyed by deadline. A loop pops expired
/// entries and completes their promises, on the pool if one is attached
/// or directly otherwise. The loop can run:
///
/// - in the foreground with [`run_until`](Self::run_until),
/// - on a dedicated thread with [`start`](Self::start),
/// - on a pool worker with [`run_in`](Self::run_in).
///
/// Dropping the scheduler stops its loops and cancels every pending entry.
///
/// ```
/// use braid::time::{Ident, Scheduler};
/// use std::time::Duration;
///
/// let scheduler = Scheduler::new();
/// scheduler.start();
///
/// let sleep = scheduler.sleep_for(Duration::from_millis(5), Ident::NONE);
/// assert!(sleep.wait().is_ok());
/// ```
pub struct Scheduler {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                heap: Mutex::new(Heap {
                    entries: BinaryHeap::new(),
                    generation: 0,
                    stopped: false,
                }),
                changed: Condvar::new(),
                seq: AtomicU64::new(0),
                pool: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Creates a scheduler that completes expired entries on `pool`.
    pub fn with_pool(pool: ThreadPool) -> Self {
        let scheduler = Self::new();
        *scheduler.inner.pool.lock().unwrap_or_else(|e| e.into_inner()) = Some(pool);
        scheduler
    }

    /// Completes `promise` once `deadline` has passed.
    pub fn schedule(&self, ident: Ident, promise: Promise<()>, deadline: Instant) {
        self.inner.schedule(ident, promise, deadline);
    }

    pub fn sleep_until(&self, deadline: Instant, ident: Ident) -> Deferred<()> {
        self.inner.sleep_until(deadline, ident)
    }

    pub fn sleep_for(&self, duration: Duration, ident: Ident) -> Deferred<()> {
        self.inner.sleep_until(Instant::now() + duration, ident)
    }

    /// Removes the earliest entry named `ident` and completes it with
    /// [`Error::Canceled`]. Returns `false` if there was none.
    pub fn cancel(&self, ident: Ident) -> bool {
        self.inner.cancel_with(ident, Error::Canceled)
    }

    /// Like [`cancel`](Self::cancel) with a chosen error.
    pub fn cancel_with(&self, ident: Ident, error: Error) -> bool {
        self.inner.cancel_with(ident, error)
    }

    /// Number of entries waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// A generator yielding the instants `start + k * period` for
    /// `k = 1, 2, ...`.
    ///
    /// Ticks are aligned to the start rather than to the moment the
    /// previous tick was consumed, so slow consumers do not accumulate
    /// drift; ticks already due are yielded without waiting.
    pub fn interval(&self, period: Duration) -> Generator<Instant> {
        let inner = self.inner.clone();
        let base = Instant::now();

        Generator::new(move |co| ticks(inner, co, base, period))
    }

    /// Runs the loop on the current thread until `until` completes.
    pub fn run_until<F: Future>(&self, until: F) -> Result<F::Output> {
        let mut until = pin!(until);
        let mut output = None;

        let waker = Waker::from(Arc::new(LoopWaker {
            inner: Arc::downgrade(&self.inner),
        }));
        let mut cx = Context::from_waker(&waker);

        tracing::debug!("scheduler loop entered in the foreground");

        self.inner.drive(|| {
            if let Poll::Ready(value) = until.as_mut().poll(&mut cx) {
                output = Some(value);
            }

            output.is_some()
        });

        output.ok_or(Error::Canceled)
    }

    /// Runs the loop on a dedicated thread.
    ///
    /// Returns `false` if the thread is already running.
    pub fn start(&self) -> bool {
        let mut thread = self.thread.lock().unwrap_or_else(|e| e.into_inner());

        if thread.is_some() {
            return false;
        }

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name("braid-scheduler".into())
            .spawn(move || {
                tracing::debug!("scheduler thread started");
                inner.drive(|| false);
            });

        match spawned {
            Ok(handle) => {
                *thread = Some(handle);
                true
            }
            Err(error) => {
                tracing::error!(%error, "failed to spawn the scheduler thread");
                false
            }
        }
    }

    /// Runs the loop on a worker of `pool` and completes expired entries on
    /// the pool.
    ///
    /// The loop occupies one worker for as long as the scheduler lives.
    pub fn run_in(&self, pool: &ThreadPool) {
        if pool.worker_count() < 2 {
            tracing::warn!("scheduler loop will occupy the only worker of its pool");
        }

        *self.inner.pool.lock().unwrap_or_else(|e| e.into_inner()) = Some(pool.clone());

        let inner = self.inner.clone();
        pool.spawn(move || {
            tracing::debug!("scheduler loop started on a pool worker");
            inner.drive(|| false);
        });
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let canceled = self.inner.stop();
        tracing::debug!(canceled, "scheduler stopped");

        let handle = self.thread.get_mut().unwrap_or_else(|e| e.into_inner()).take();

        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }

        // Release the pool reference held for dispatching completions.
        self.inner.pool.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
