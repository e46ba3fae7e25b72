use crate::awaiter::Handle;

use std::collections::VecDeque;
use std::sync::Mutex;

/// A per-worker local queue.
///
/// The owning worker pushes and pops at the back (LIFO), which keeps
/// recently resumed computations hot in cache. Siblings steal from the
/// front (FIFO).
pub(crate) struct LocalQueue {
    inner: Mutex<VecDeque<Handle>>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, handle: Handle) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(handle);
    }

    pub(crate) fn pop(&self) -> Option<Handle> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_back()
    }

    pub(crate) fn steal(&self) -> Option<Handle> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    pub(crate) fn drain(&self) -> Vec<Handle> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect()
    }
}
