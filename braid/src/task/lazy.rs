use super::core::TaskCore;
use crate::awaiter::{Awaitable, Awaiter, Subscription, WakerSlot};
use crate::error::Result;
use crate::policy::{Policy, Queued};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

/// A computation that starts on first consumption.
///
/// The first consumer to await, join or subscribe starts the body through
/// the policy; later consumers share the result. Before that, the body can
/// be canceled with [`mark_canceled`](Self::mark_canceled) and never runs.
pub struct Lazy<T, P = Queued> {
    core: Arc<TaskCore<T, P>>,
    slot: WakerSlot,
}

impl<T: Send + 'static, P: Policy> Lazy<T, P> {
    pub fn with_policy<F>(policy: P, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            core: TaskCore::new(policy, future),
            slot: WakerSlot::new(),
        }
    }

    /// Starts the body now. Returns `false` if it was already started.
    pub fn start(&self) -> bool {
        self.core.start()
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    pub fn is_ready(&self) -> bool {
        self.core.shared().is_ready()
    }

    /// Cancels a body that has not started yet.
    ///
    /// Consumers then observe [`Error::Canceled`](crate::Error::Canceled).
    /// Returns `false` if the body already started.
    pub fn mark_canceled(&self) -> bool {
        if self.core.is_started() {
            return false;
        }

        self.core.mark_canceled();
        true
    }

    /// Starts the body if needed and blocks until it completes.
    pub fn join(&self) -> Result<T>
    where
        T: Clone,
    {
        crate::block_on(self.clone())
    }
}

impl<T> Lazy<T> {
    pub fn new<F>(future: F) -> Self
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        Self::with_policy(Queued, future)
    }
}

impl<T, P> Clone for Lazy<T, P> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            slot: WakerSlot::new(),
        }
    }
}

impl<T: Clone + Send + 'static, P: Policy> Future for Lazy<T, P> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let shared = this.core.shared();

        if !shared.is_ready() && this.core.start() {
            tracing::trace!("lazy started by its first consumer");
        }

        ready!(this.slot.poll_ready(&**shared, cx));

        // Safety: lazy results are only ever read by cloning.
        Poll::Ready(unsafe { shared.read_cloned() })
    }
}

impl<T: Clone + Send + 'static, P: Policy> Awaitable for Lazy<T, P> {
    type Output = T;

    fn is_ready(&self) -> bool {
        self.core.shared().is_ready()
    }

    fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription {
        let subscription = self.core.shared().subscribe(awaiter);
        self.core.start();
        subscription
    }

    fn consume(&mut self) -> Result<T> {
        // Safety: lazy results are only ever read by cloning.
        unsafe { self.core.shared().read_cloned() }
    }
}

impl<T, P> fmt::Debug for Lazy<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("started", &self.core.is_started())
            .field("ready", &self.core.shared().is_ready())
            .finish()
    }
}
