//! Per-thread FIFO of ready handles.
//!
//! Resuming through [`Queued`] appends the handle to the current thread's
//! queue. If no drain is in progress on this thread, the caller becomes the
//! outermost resumer and drains the queue in order; otherwise the running
//! drain picks the handle up once the current computation suspends. Stack
//! depth therefore stays bounded no matter how resumptions nest.
//!
//! A thread that blocks inside a drained computation (a `join()` issued from
//! a queued body) cannot wait for the outer drain, so blocking entry points
//! run the queue themselves through [`run_ready`].

use super::Policy;
use crate::awaiter::Handle;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

thread_local! {
    /// Handles waiting to run on this thread.
    static READY: RefCell<VecDeque<Handle>> = const { RefCell::new(VecDeque::new()) };

    /// Whether a drain loop is active on this thread.
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Runs the current computation to its suspension point, then the queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct Queued;

impl Policy for Queued {
    fn resume(&self, handle: Handle) {
        let mut slot = Some(handle);
        let pushed = READY.try_with(|ready| {
            if let Some(handle) = slot.take() {
                ready.borrow_mut().push_back(handle);
            }
        });

        // The queue is gone while the thread tears down its locals.
        if pushed.is_err() {
            if let Some(handle) = slot.take() {
                handle.resume();
            }
            return;
        }

        drain();
    }

    fn can_block(&self) -> bool {
        !has_pending()
    }

    fn resume_handle_next(&self) -> Option<Handle> {
        next()
    }
}

/// Restores the draining flag even if a handle unwinds.
struct DrainGuard {
    outer: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let _ = DRAINING.try_with(|d| d.set(self.outer));
    }
}

fn next() -> Option<Handle> {
    READY
        .try_with(|ready| ready.borrow_mut().pop_front())
        .ok()
        .flatten()
}

/// Drains the queue unless an outer drain is already running.
///
/// Returns `true` if at least one handle ran.
pub(crate) fn drain() -> bool {
    if DRAINING.try_with(Cell::get).unwrap_or(true) {
        return false;
    }

    run_ready()
}

/// Runs every ready handle of this thread, even inside an outer drain.
///
/// Only blocking entry points call this: the caller is about to park and
/// the outer drain cannot make progress until it returns.
///
/// Returns `true` if at least one handle ran.
pub(crate) fn run_ready() -> bool {
    let Ok(outer) = DRAINING.try_with(|d| d.replace(true)) else {
        return false;
    };

    let _guard = DrainGuard { outer };
    let mut ran = false;

    while let Some(handle) = next() {
        handle.resume();
        ran = true;
    }

    ran
}

/// Returns `true` if ready handles are waiting on this thread.
pub(crate) fn has_pending() -> bool {
    READY
        .try_with(|ready| !ready.borrow().is_empty())
        .unwrap_or(false)
}
