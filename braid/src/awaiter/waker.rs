use super::{Awaitable, Awaiter, Subscription};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

/// Awaiter that wakes a [`Waker`] when resumed.
///
/// This is the bridge between the awaiter protocol and `std::future`:
/// a future subscribes one of these on its first pending poll and only
/// refreshes the stored waker on later polls.
pub(crate) struct WakerAwaiter {
    waker: Mutex<Option<Waker>>,
    fired: AtomicBool,
}

impl WakerAwaiter {
    pub(crate) fn new(waker: Waker) -> Self {
        Self {
            waker: Mutex::new(Some(waker)),
            fired: AtomicBool::new(false),
        }
    }

    /// Replaces the stored waker unless it would wake the same task.
    pub(crate) fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock().unwrap_or_else(|e| e.into_inner());

        match slot.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    pub(crate) fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Awaiter for WakerAwaiter {
    fn resume(self: Arc<Self>) {
        self.fired.store(true, Ordering::Release);

        let waker = self.waker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Per-future subscription state.
///
/// Ensures a future subscribes at most one node to an awaitable no matter
/// how many times it is polled.
#[derive(Default)]
pub(crate) struct WakerSlot {
    node: Option<Arc<WakerAwaiter>>,
}

impl WakerSlot {
    pub(crate) fn new() -> Self {
        Self { node: None }
    }

    /// Polls `awaitable` for readiness, subscribing on the first pending poll.
    pub(crate) fn poll_ready<A>(&mut self, awaitable: &A, cx: &mut Context<'_>) -> Poll<()>
    where
        A: Awaitable + ?Sized,
    {
        if awaitable.is_ready() {
            return Poll::Ready(());
        }

        if let Some(node) = &self.node {
            node.register(cx.waker());

            if node.fired() || awaitable.is_ready() {
                return Poll::Ready(());
            }

            return Poll::Pending;
        }

        let node = Arc::new(WakerAwaiter::new(cx.waker().clone()));

        match awaitable.subscribe(node.clone()) {
            Subscription::Ready => Poll::Ready(()),
            Subscription::Attached => {
                self.node = Some(node);
                Poll::Pending
            }
        }
    }
}
