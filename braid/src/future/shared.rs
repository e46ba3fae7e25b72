use crate::awaiter::chain::Chain;
use crate::awaiter::{Awaitable, Awaiter, Subscription};
use crate::cell::ValueCell;
use crate::diagnostics;
use crate::error::{Error, Result};

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

const NOT_READY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;
const CONSUMED: u8 = 3;

/// Result state shared by a producer and its consumers.
///
/// One writer wins the transition out of `NOT_READY`, fills the cell,
/// publishes `READY` and then resumes the chain. Readers only touch the
/// cell once they observed `READY`.
pub(crate) struct Shared<T> {
    state: AtomicU8,
    cell: UnsafeCell<ValueCell<T>>,
    chain: Chain,
    observed: AtomicBool,
}

// Safety: the cell is written by the single winner of the state transition
// and read only after `READY` was published with release ordering.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(NOT_READY),
            cell: UnsafeCell::new(ValueCell::new()),
            chain: Chain::new(),
            observed: AtomicBool::new(false),
        }
    }

    pub(crate) fn completed(result: Result<T>) -> Self {
        let mut cell = ValueCell::new();
        cell.set_result(result);

        let shared = Self {
            state: AtomicU8::new(READY),
            cell: UnsafeCell::new(cell),
            chain: Chain::new(),
            observed: AtomicBool::new(false),
        };
        drop(shared.chain.close());
        shared
    }

    /// Publishes `result` and resumes every subscriber.
    ///
    /// Returns `false` if another writer got there first.
    pub(crate) fn complete(&self, result: Result<T>) -> bool {
        if self
            .state
            .compare_exchange(NOT_READY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        // Safety: winning the transition grants exclusive access to the cell.
        unsafe { (*self.cell.get()).set_result(result) };

        self.state.store(READY, Ordering::Release);
        self.chain.resume_all();

        true
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) >= READY
    }

    pub(crate) fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription {
        if self.is_ready() {
            return Subscription::Ready;
        }

        match self.chain.subscribe(awaiter) {
            Ok(()) => Subscription::Attached,
            Err(_) => Subscription::Ready,
        }
    }

    /// Moves the result out. Only the first caller gets it.
    pub(crate) fn take(&self) -> Result<T> {
        match self
            .state
            .compare_exchange(READY, CONSUMED, Ordering::Acquire, Ordering::Acquire)
        {
            Ok(_) => {
                self.observed.store(true, Ordering::Relaxed);
                // Safety: the `READY -> CONSUMED` winner owns the cell.
                unsafe { (*self.cell.get()).get() }
            }
            Err(CONSUMED) => Err(Error::AlreadyAwaited),
            Err(_) => Err(Error::NotReady),
        }
    }

    /// Clones the result out, leaving it in place for other readers.
    ///
    /// # Safety
    ///
    /// No caller may ever [`take`](Self::take) from this state.
    pub(crate) unsafe fn read_cloned(&self) -> Result<T>
    where
        T: Clone,
    {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }

        self.observed.store(true, Ordering::Relaxed);

        // Safety: the cell is immutable once `READY`, and nobody takes.
        unsafe { (*self.cell.get()).get_cloned() }
    }
}

impl<T> Awaitable for Shared<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        Shared::is_ready(self)
    }

    fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription {
        Shared::subscribe(self, awaiter)
    }

    fn consume(&mut self) -> Result<T> {
        self.take()
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if *self.observed.get_mut() {
            return;
        }

        if let Some(error) = self.cell.get_mut().take_error() {
            diagnostics::report_unobserved(&error);
        }
    }
}
