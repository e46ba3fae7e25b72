//! Multi-producer multi-consumer awaitable queue.
//!
//! Consumers that find the queue empty park a [`Waiter`] and suspend. A
//! push hands its item to the oldest parked consumer by *reserving* it:
//! the item stays in the payload but is no longer visible to other
//! consumers until the resumed one moves it out. Exactly one item is
//! therefore matched to each resumed consumer, however pushes and pops
//! interleave.

use super::waiter::{CANCELED, GRANTED, WAITING, Waiter};
use crate::error::{Error, Result};

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

pub(crate) struct State<T> {
    pub(crate) payload: VecDeque<T>,
    pub(crate) consumers: VecDeque<Arc<Waiter>>,
    pub(crate) producers: VecDeque<Arc<Waiter>>,
    /// Items promised to resumed consumers but not moved out yet.
    pub(crate) reserved: usize,
    /// Slots promised to resumed producers but not filled yet.
    pub(crate) admitted: usize,
    pub(crate) closed: bool,
}

impl<T> State<T> {
    /// Items available to a new consumer.
    pub(crate) fn available(&self) -> usize {
        self.payload.len() - self.reserved
    }
}

/// Waiters whose outcome was decided under the lock and that must be woken
/// once it is released.
pub(crate) type Wakeups = Vec<Arc<Waiter>>;

pub(crate) fn wake_all(wakeups: Wakeups) {
    for waiter in wakeups {
        waiter.wake();
    }
}

pub(crate) struct Inner<T> {
    state: Mutex<State<T>>,
    capacity: Option<usize>,
    handles: AtomicUsize,
}

impl<T> Inner<T> {
    pub(crate) fn new(capacity: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                payload: VecDeque::new(),
                consumers: VecDeque::new(),
                producers: VecDeque::new(),
                reserved: 0,
                admitted: 0,
                closed: false,
            }),
            capacity,
            handles: AtomicUsize::new(1),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Whether a producer may push right now without exceeding capacity.
    pub(crate) fn has_room(&self, state: &State<T>) -> bool {
        self.capacity
            .is_none_or(|capacity| state.payload.len() + state.admitted < capacity)
    }

    /// Appends `value` and reserves it for the oldest parked consumer.
    pub(crate) fn push_locked(&self, state: &mut State<T>, value: T, wakeups: &mut Wakeups) {
        state.payload.push_back(value);
        self.grant_consumer(state, wakeups);
    }

    fn grant_consumer(&self, state: &mut State<T>, wakeups: &mut Wakeups) {
        if state.available() == 0 {
            return;
        }

        if let Some(waiter) = state.consumers.pop_front() {
            state.reserved += 1;
            waiter.decide(GRANTED);
            wakeups.push(waiter);
        }
    }

    /// Admits parked producers while there is room.
    fn admit_producers(&self, state: &mut State<T>, wakeups: &mut Wakeups) {
        while self.has_room(state) {
            let Some(waiter) = state.producers.pop_front() else {
                break;
            };

            state.admitted += 1;
            waiter.decide(GRANTED);
            wakeups.push(waiter);
        }
    }

    /// Moves the front item out for a consumer that held no reservation.
    fn take_unreserved(&self, state: &mut State<T>, wakeups: &mut Wakeups) -> Option<T> {
        if state.available() == 0 {
            return None;
        }

        let value = state.payload.pop_front();
        self.admit_producers(state, wakeups);
        value
    }

    /// Moves the front item out for a consumer holding a reservation.
    fn take_reserved(&self, state: &mut State<T>, wakeups: &mut Wakeups) -> Option<T> {
        state.reserved = state.reserved.saturating_sub(1);
        let value = state.payload.pop_front();
        self.admit_producers(state, wakeups);
        value
    }

    /// Gives a producer slot back after its holder went away.
    pub(crate) fn release_admission(&self, state: &mut State<T>, wakeups: &mut Wakeups) {
        state.admitted = state.admitted.saturating_sub(1);
        self.admit_producers(state, wakeups);
    }

    pub(crate) fn close(&self) {
        let mut wakeups = Vec::new();

        {
            let mut state = self.lock();
            if state.closed {
                return;
            }

            state.closed = true;

            wakeups.extend(state.consumers.drain(..));
            wakeups.extend(state.producers.drain(..));

            for waiter in &wakeups {
                waiter.decide(CANCELED);
            }
        }

        if !wakeups.is_empty() {
            tracing::debug!(waiters = wakeups.len(), "queue closed with pending waiters");
        }

        wake_all(wakeups);
    }

    pub(crate) fn acquire_handle(self: &Arc<Self>) -> Arc<Self> {
        self.handles.fetch_add(1, Ordering::Relaxed);
        self.clone()
    }

    /// Returns `true` when the last handle is released.
    pub(crate) fn release_handle(&self) -> bool {
        self.handles.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

/// Unbounded multi-producer multi-consumer queue.
///
/// Clones share the queue. Once the last clone is dropped, or after
/// [`close`](Self::close), consumers still waiting resume with
/// [`Error::Canceled`]. Items already pushed can still be popped.
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            inner: Inner::new(None),
        }
    }

    /// Appends `value`, handing it to a waiting consumer if there is one.
    ///
    /// Returns the value back if the queue is closed.
    pub fn push(&self, value: T) -> std::result::Result<(), T> {
        let mut wakeups = Vec::new();

        {
            let mut state = self.inner.lock();
            if state.closed {
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

    /// Takes the next item if one is available.
    pub fn try_pop(&self) -> Option<T> {
        try_pop(&self.inner)
    }

    /// Number of items available to new consumers.
    pub fn len(&self) -> usize {
        self.inner.lock().available()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every waiting consumer and rejects further pushes.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

pub(crate) fn try_pop<T>(inner: &Inner<T>) -> Option<T> {
    let mut wakeups = Vec::new();
    let value = {
        let mut state = inner.lock();
        inner.take_unreserved(&mut state, &mut wakeups)
    };

    wake_all(wakeups);
    value
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.acquire_handle(),
        }
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        if self.inner.release_handle() {
            self.inner.close();
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("len", &self.len()).finish()
    }
}

/// Future returned by `pop`.
///
/// Dropping it after it was handed an item passes the item on to the next
/// waiting consumer.
#[must_use = "futures do nothing unless awaited"]
pub struct Pop<T> {
    inner: Arc<Inner<T>>,
    waiter: Option<Arc<Waiter>>,
}

impl<T> Pop<T> {
    pub(crate) fn new(inner: Arc<Inner<T>>) -> Self {
        Self {
            inner,
            waiter: None,
        }
    }
}

impl<T> Unpin for Pop<T> {}

impl<T> Future for Pop<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut wakeups = Vec::new();

        let output = if let Some(waiter) = &this.waiter {
            waiter.register(cx.waker());

            match waiter.outcome() {
                WAITING => return Poll::Pending,
                GRANTED => {
                    let mut state = this.inner.lock();
                    this.inner
                        .take_reserved(&mut state, &mut wakeups)
                        .ok_or(Error::Canceled)
                }
                _ => Err(Error::Canceled),
            }
        } else {
            let mut state = this.inner.lock();

            if let Some(value) = this.inner.take_unreserved(&mut state, &mut wakeups) {
                Ok(value)
            } else if state.closed {
                Err(Error::Canceled)
            } else {
                let waiter = Arc::new(Waiter::new(cx.waker()));
                state.consumers.push_back(waiter.clone());
                this.waiter = Some(waiter);
                return Poll::Pending;
            }
        };

        this.waiter = None;
        wake_all(wakeups);

        Poll::Ready(output)
    }
}

impl<T> Drop for Pop<T> {
    fn drop(&mut self) {
        let Some(waiter) = self.waiter.take() else {
            return;
        };

        let mut wakeups = Vec::new();

        {
            let mut state = self.inner.lock();

            match waiter.outcome() {
                WAITING => state.consumers.retain(|w| !Arc::ptr_eq(w, &waiter)),
                GRANTED => {
                    state.reserved = state.reserved.saturating_sub(1);
                    self.inner.grant_consumer(&mut state, &mut wakeups);
                }
                _ => {}
            }
        }

        wake_all(wakeups);
    }
}

impl<T> fmt::Debug for Pop<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pop")
            .field("waiting", &self.waiter.is_some())
            .finish()
    }
}
