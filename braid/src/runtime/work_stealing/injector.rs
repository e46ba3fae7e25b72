use crate::awaiter::Handle;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Global handle injector shared by every worker of a pool.
///
/// It also coordinates worker parking: idle workers sleep on the condition
/// variable until work arrives, shutdown is signaled, or a short timeout
/// expires so that they can retry stealing from their siblings.
pub(crate) struct Injector {
    /// Handles enqueued from outside the pool.
    queue: Mutex<VecDeque<Handle>>,

    /// Condition variable used to wake parked workers.
    condvar: Condvar,

    /// Indicates whether the pool is shutting down.
    shutdown: AtomicBool,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Signals shutdown and wakes all parked workers.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a handle and wakes one parked worker.
    pub(crate) fn push(&self, handle: Handle) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(handle);
        self.condvar.notify_one();
    }

    /// Wakes one parked worker without enqueuing anything.
    pub(crate) fn notify(&self) {
        self.condvar.notify_one();
    }

    /// Parks the calling worker until work arrives or a short timeout expires.
    pub(crate) fn park(&self) {
        let queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());

        if self.is_shutdown() || !queue.is_empty() {
            return;
        }

        let _ = self
            .condvar
            .wait_timeout(queue, Duration::from_millis(1))
            .unwrap_or_else(|e| e.into_inner());
    }

    /// Steals a handle from the front of the global queue.
    pub(crate) fn steal(&self) -> Option<Handle> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Removes every handle still queued.
    pub(crate) fn drain(&self) -> Vec<Handle> {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }
}
