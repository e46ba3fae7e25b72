use crate::error::{Error, Result};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

/// Hand-off slot between a generator body and its consumer.
pub(crate) struct Slot<T> {
    pub(crate) item: Option<T>,
    /// The consumer asked for an item and has not received one yet.
    pub(crate) waiting: bool,
    pub(crate) consumer: Option<Waker>,
    /// The generator was dropped or its body returned.
    pub(crate) closed: bool,
}

pub(crate) type SharedSlot<T> = Arc<Mutex<Slot<T>>>;

pub(crate) fn new_slot<T>() -> SharedSlot<T> {
    Arc::new(Mutex::new(Slot {
        item: None,
        waiting: false,
        consumer: None,
        closed: false,
    }))
}

pub(crate) fn lock<T>(slot: &SharedSlot<T>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// The producing side of a [`Generator`](super::Generator), handed to its
/// body.
pub struct Co<T> {
    slot: SharedSlot<T>,
}

impl<T> Co<T> {
    pub(crate) fn new(slot: SharedSlot<T>) -> Self {
        Self { slot }
    }

    /// Hands `value` to the consumer and suspends until the next item is
    /// requested.
    ///
    /// Must be awaited from the generator body itself.
    pub fn yield_(&self, value: T) -> Yield<'_, T> {
        Yield {
            co: self,
            value: Some(value),
        }
    }

    /// Hands `value` to a consumer that is currently waiting for it.
    ///
    /// This is the entry point for callbacks running outside the body.
    /// Fails with [`Error::NoMoreValues`] when no consumer is waiting to
    /// receive, including after the generator was dropped.
    pub fn try_yield(&self, value: T) -> Result<()> {
        let waker = {
            let mut slot = lock(&self.slot);

            if slot.closed || !slot.waiting || slot.item.is_some() {
                return Err(Error::NoMoreValues);
            }

            slot.item = Some(value);
            slot.waiting = false;
            slot.consumer.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        Ok(())
    }

    /// Returns `true` once the generator is gone.
    pub fn is_closed(&self) -> bool {
        lock(&self.slot).closed
    }
}

impl<T> Clone for Co<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> fmt::Debug for Co<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Co")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Future returned by [`Co::yield_`].
#[must_use = "a yielded value is only delivered when awaited"]
pub struct Yield<'a, T> {
    co: &'a Co<T>,
    value: Option<T>,
}

impl<T> Unpin for Yield<'_, T> {}

impl<T> Future for Yield<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut slot = lock(&this.co.slot);

        if let Some(value) = this.value.take() {
            if slot.closed {
                return Poll::Ready(());
            }

            // A callback got there first; deliver ours on the next request.
            if slot.item.is_some() {
                this.value = Some(value);
                return Poll::Pending;
            }

            // The consumer is polling us and picks the item up on return.
            slot.item = Some(value);
            slot.waiting = false;
            return Poll::Pending;
        }

        if slot.item.is_some() {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}
