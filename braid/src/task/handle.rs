use super::core::TaskCore;
use crate::awaiter::{Awaitable, Awaiter, Subscription, WakerSlot};
use crate::error::Result;
use crate::policy::{Initialize, Policy, Queued, Start};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

/// An eagerly started computation whose result any number of consumers can
/// await.
///
/// The task starts according to its policy's [`Policy::initial`] and keeps
/// running when every `Task` handle is dropped. Awaiting a clone yields the
/// same value, or the same error re-raised.
///
/// Running computations cannot be killed: a body that never suspends runs to
/// completion no matter how many handles are dropped.
pub struct Task<T, P = Queued> {
    core: Arc<TaskCore<T, P>>,
    slot: WakerSlot,
}

impl<T: Send + 'static, P: Policy> Task<T, P> {
    /// Creates a task governed by `policy`.
    pub fn with_policy<F>(policy: P, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let core = TaskCore::new(policy, future);

        if core.policy().initial() == Start::Immediate {
            core.start();
        }

        Self {
            core,
            slot: WakerSlot::new(),
        }
    }

    /// Supplies a dependency to the policy, starting the task if the policy
    /// was waiting for it.
    pub fn initialize_policy<A>(&self, args: A) -> bool
    where
        P: Initialize<A>,
    {
        let resume = self.core.policy().initialize_policy(args);

        if resume {
            self.core.start();
        }

        resume
    }

    pub fn policy(&self) -> &P {
        self.core.policy()
    }

    /// Returns `true` once the result is available.
    pub fn is_ready(&self) -> bool {
        self.core.shared().is_ready()
    }

    /// Blocks the current thread until the task completes.
    ///
    /// Queued resumptions targeting this thread keep running while it waits.
    pub fn join(&self) -> Result<T>
    where
        T: Clone,
    {
        if !self.core.policy().can_block() {
            tracing::debug!("joining a task from a thread with pending work");
        }

        crate::block_on(self.clone())
    }
}

impl<T> Task<T> {
    /// Creates a task governed by the [`Queued`] policy.
    pub fn new<F>(future: F) -> Self
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        Self::with_policy(Queued, future)
    }
}

impl<T, P> Clone for Task<T, P> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            slot: WakerSlot::new(),
        }
    }
}

impl<T: Clone + Send + 'static, P: Policy> Future for Task<T, P> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let shared = this.core.shared();
        ready!(this.slot.poll_ready(&**shared, cx));

        // Safety: task results are only ever read by cloning.
        Poll::Ready(unsafe { shared.read_cloned() })
    }
}

impl<T: Clone + Send + 'static, P: Policy> Awaitable for Task<T, P> {
    type Output = T;

    fn is_ready(&self) -> bool {
        self.core.shared().is_ready()
    }

    fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription {
        self.core.shared().subscribe(awaiter)
    }

    fn consume(&mut self) -> Result<T> {
        // Safety: task results are only ever read by cloning.
        unsafe { self.core.shared().read_cloned() }
    }
}

impl<T, P> fmt::Debug for Task<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("ready", &self.core.shared().is_ready())
            .finish()
    }
}
