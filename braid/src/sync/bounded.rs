use super::queue::{Inner, Pop, try_pop, wake_all};
use super::waiter::{GRANTED, WAITING, Waiter};
use crate::error::{Error, Result};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A [`Queue`](super::Queue) holding at most `capacity` items.
///
/// Pushing into a full queue suspends the producer. Every pop admits the
/// oldest suspended producer once there is room, using the same reserve
/// discipline consumers get: an admitted producer owns its slot until it
/// either pushes or goes away.
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a bounded queue needs room for one item");

        Self {
            inner: Inner::new(Some(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().unwrap_or(usize::MAX)
    }

    /// Pushes `value`, waiting for room if the queue is full.
    pub fn push(&self, value: T) -> Push<T> {
        Push {
            inner: self.inner.clone(),
            value: Some(value),
            waiter: None,
        }
    }

    /// Pushes `value` if there is room right now.
    ///
    /// Returns the value back when the queue is full or closed.
    pub fn try_push(&self, value: T) -> std::result::Result<(), T> {
        let mut wakeups = Vec::new();

        {
            let mut state = self.inner.lock();

            if state.closed || !state.producers.is_empty() || !self.inner.has_room(&state) {
                return Err(value);
            }

            self.inner.push_locked(&mut state, value, &mut wakeups);
        }

        wake_all(wakeups);
        Ok(())
    }

    /// Waits for the next item.
    pub fn pop(&self) -> Pop<T> {
        Pop::new(self.inner.clone())
    }

    pub fn try_pop(&self) -> Option<T> {
        try_pop(&self.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().available()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a push would have to wait.
    pub fn is_full(&self) -> bool {
        let state = self.inner.lock();
        !self.inner.has_room(&state)
    }

    /// Cancels every waiting producer and consumer.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.acquire_handle(),
        }
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        if self.inner.release_handle() {
            self.inner.close();
        }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Future returned by [`BoundedQueue::push`].
///
/// Resolves once the item is in the queue, or with
/// [`Error::Canceled`] if the queue closes first; the item is dropped in
/// that case.
#[must_use = "futures do nothing unless awaited"]
pub struct Push<T> {
    inner: Arc<Inner<T>>,
    value: Option<T>,
    waiter: Option<Arc<Waiter>>,
}

impl<T> Unpin for Push<T> {}

impl<T> Future for Push<T> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let Some(value) = this.value.take() else {
            return Poll::Ready(Err(Error::AlreadyAwaited));
        };

        let mut wakeups = Vec::new();

        let output = if let Some(waiter) = &this.waiter {
            waiter.register(cx.waker());

            match waiter.outcome() {
                WAITING => {
                    this.value = Some(value);
                    return Poll::Pending;
                }
                GRANTED => {
                    let mut state = this.inner.lock();
                    state.admitted = state.admitted.saturating_sub(1);
                    this.inner.push_locked(&mut state, value, &mut wakeups);
                    Ok(())
                }
                _ => Err(Error::Canceled),
            }
        } else {
            let mut state = this.inner.lock();

            if state.closed {
                Err(Error::Canceled)
            } else if state.producers.is_empty() && this.inner.has_room(&state) {
                this.inner.push_locked(&mut state, value, &mut wakeups);
                Ok(())
            } else {
                let waiter = Arc::new(Waiter::new(cx.waker()));
                state.producers.push_back(waiter.clone());
                this.waiter = Some(waiter);
                this.value = Some(value);
                return Poll::Pending;
            }
        };

        this.waiter = None;
        wake_all(wakeups);

        Poll::Ready(output)
    }
}

impl<T> Drop for Push<T> {
    fn drop(&mut self) {
        let Some(waiter) = self.waiter.take() else {
            return;
        };

        let mut wakeups = Vec::new();

        {
            let mut state = self.inner.lock();

            match waiter.outcome() {
                WAITING => state.producers.retain(|w| !Arc::ptr_eq(w, &waiter)),
                GRANTED => self.inner.release_admission(&mut state, &mut wakeups),
                _ => {}
            }
        }

        wake_all(wakeups);
    }
}

impl<T> fmt::Debug for Push<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Push")
            .field("waiting", &self.waiter.is_some())
            .finish()
    }
}
