use super::PoolCore;
use crate::awaiter::Handle;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A worker thread of a [`ThreadPool`](super::ThreadPool).
///
/// The execution order is:
/// 1. Pop from the local queue
/// 2. Steal from the global injector
/// 3. Steal from other workers
/// 4. Park if no work is available
pub(crate) struct Worker {
    /// Index of the worker.
    id: usize,

    /// Queues shared with the rest of the pool.
    core: Arc<PoolCore>,
}

impl Worker {
    pub(crate) fn new(id: usize, core: Arc<PoolCore>) -> Self {
        Self { id, core }
    }

    /// Runs the worker loop until the pool shuts down.
    pub(crate) fn run(&self) {
        tracing::trace!(worker = self.id, "worker started");

        while !self.core.injector.is_shutdown() {
            let next = self.core.locals[self.id]
                .pop()
                .or_else(|| self.core.injector.steal())
                .or_else(|| self.try_steal());

            match next {
                Some(handle) => self.execute(handle),
                None => self.core.injector.park(),
            }
        }

        tracing::trace!(worker = self.id, "worker exiting");
    }

    fn execute(&self, handle: Handle) {
        // A panicking job must not take the worker down with it.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handle.resume())) {
            let error = crate::error::Error::from_panic(payload);
            tracing::error!(worker = self.id, %error, "job panicked on pool worker");
        }
    }

    /// Attempts to steal a handle from a sibling's local queue.
    ///
    /// Siblings are visited round-robin starting after this worker.
    fn try_steal(&self) -> Option<Handle> {
        let len = self.core.locals.len();

        if len <= 1 {
            return None;
        }

        (1..len)
            .map(|i| (self.id + i) % len)
            .find_map(|victim| self.core.locals[victim].steal())
    }
}
