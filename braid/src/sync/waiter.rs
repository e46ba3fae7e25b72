use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::Waker;

pub(crate) const WAITING: u8 = 0;
pub(crate) const GRANTED: u8 = 1;
pub(crate) const CANCELED: u8 = 2;

/// A suspended queue operation.
///
/// The outcome is always decided while the queue lock is held; the waker
/// is fired after the lock is released.
pub(crate) struct Waiter {
    outcome: AtomicU8,
    waker: Mutex<Option<Waker>>,
}

impl Waiter {
    pub(crate) fn new(waker: &Waker) -> Self {
        Self {
            outcome: AtomicU8::new(WAITING),
            waker: Mutex::new(Some(waker.clone())),
        }
    }

    pub(crate) fn outcome(&self) -> u8 {
        self.outcome.load(Ordering::Acquire)
    }

    /// Decides the outcome. Call with the queue lock held.
    pub(crate) fn decide(&self, outcome: u8) {
        self.outcome.store(outcome, Ordering::Release);
    }

    pub(crate) fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock().unwrap_or_else(|e| e.into_inner());

        match slot.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    pub(crate) fn wake(&self) {
        let waker = self.waker.lock().unwrap_or_else(|e| e.into_inner()).take();

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}
