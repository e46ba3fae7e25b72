use super::shared::Shared;
use crate::awaiter::{self, Awaitable, Awaiter, Subscription, WakerSlot};
use crate::error::{Error, Result};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

/// Single-consumer view of a result completed through a
/// [`Promise`](super::Promise).
///
/// Awaiting resolves to the value or re-raises the stored error. Use
/// [`share`](Self::share) when more than one consumer needs the result.
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
    slot: WakerSlot,
}

impl<T> Deferred<T> {
    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self {
            shared,
            slot: WakerSlot::new(),
        }
    }

    /// A result that is already available.
    pub fn ready(value: T) -> Self {
        Self::from_shared(Arc::new(Shared::completed(Ok(value))))
    }

    /// A result that already failed with `error`.
    pub fn failed(error: Error) -> Self {
        Self::from_shared(Arc::new(Shared::completed(Err(error))))
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Returns the result if it is available, without waiting.
    pub fn try_get(&mut self) -> Option<Result<T>> {
        self.shared.is_ready().then(|| self.shared.take())
    }

    /// Blocks the current thread until the result is available.
    pub fn wait(self) -> Result<T> {
        awaiter::wait(self)
    }

    /// Converts into a result any number of consumers can await.
    pub fn share(self) -> SharedDeferred<T>
    where
        T: Clone,
    {
        SharedDeferred {
            shared: self.shared,
            slot: WakerSlot::new(),
        }
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        ready!(this.slot.poll_ready(&*this.shared, cx));

        Poll::Ready(this.shared.take())
    }
}

impl<T> Awaitable for Deferred<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription {
        self.shared.subscribe(awaiter)
    }

    fn consume(&mut self) -> Result<T> {
        self.shared.take()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Multi-consumer view of a deferred result.
///
/// Every clone awaits independently and observes the same value, or the
/// same error re-raised.
pub struct SharedDeferred<T: Clone> {
    shared: Arc<Shared<T>>,
    slot: WakerSlot,
}

impl<T: Clone> SharedDeferred<T> {
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Returns the result if it is available, without waiting.
    pub fn try_get(&self) -> Option<Result<T>> {
        // Safety: a shared view never takes from the state.
        self.shared
            .is_ready()
            .then(|| unsafe { self.shared.read_cloned() })
    }

    /// Blocks the current thread until the result is available.
    pub fn wait(&self) -> Result<T> {
        awaiter::wait(self.clone())
    }
}

impl<T: Clone> Clone for SharedDeferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            slot: WakerSlot::new(),
        }
    }
}

impl<T: Clone> Future for SharedDeferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        ready!(this.slot.poll_ready(&*this.shared, cx));

        // Safety: a shared view never takes from the state.
        Poll::Ready(unsafe { this.shared.read_cloned() })
    }
}

impl<T: Clone> Awaitable for SharedDeferred<T> {
    type Output = T;

    fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription {
        self.shared.subscribe(awaiter)
    }

    fn consume(&mut self) -> Result<T> {
        // Safety: a shared view never takes from the state.
        unsafe { self.shared.read_cloned() }
    }
}

impl<T: Clone> fmt::Debug for SharedDeferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDeferred")
            .field("ready", &self.is_ready())
            .finish()
    }
}
