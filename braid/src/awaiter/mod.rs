//! The awaiter/awaitable protocol.
//!
//! Every primitive in the crate that can suspend a computation speaks the
//! same three-hook protocol:
//!
//! - [`Awaitable::is_ready`]: a constant-time readiness probe,
//! - [`Awaitable::subscribe`]: attach an [`Awaiter`], or learn that the
//!   result is already available,
//! - [`Awaitable::consume`]: read the result or re-raise the stored error.
//!
//! Awaiters are anything that can be resumed. Futures use a waker-backed
//! awaiter, blocking callers use [`SyncWait`], and plain functions can be
//! attached through [`CallbackAwaiter`].
//!
//! Subscribers of a shared state are threaded onto a lock-free LIFO chain;
//! publication detaches the chain atomically and resumes each awaiter once.

mod callback;
mod handle;
mod sync_wait;
mod waker;

pub(crate) mod chain;

pub use callback::CallbackAwaiter;
pub use handle::{Handle, Resumable};
pub use sync_wait::SyncWait;

pub(crate) use waker::WakerSlot;

use crate::error::Result;
use crate::policy::queued;

use std::sync::Arc;

/// Anything that can be brought back to execution once a result is ready.
pub trait Awaiter: Send + Sync {
    /// Resumes the suspended computation.
    ///
    /// Invoked exactly once per successful subscription.
    fn resume(self: Arc<Self>);

    /// Symmetric-transfer variant of [`resume`](Self::resume).
    ///
    /// Instead of re-entering the computation, the awaiter may hand back the
    /// handle the caller should continue with. The default simply resumes
    /// and returns no handle.
    fn resume_handle(self: Arc<Self>) -> Option<Handle> {
        self.resume();
        None
    }
}

/// Outcome of [`Awaitable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// The awaiter was attached and will be resumed exactly once.
    Attached,

    /// The result was already available; the awaiter will not be resumed.
    Ready,
}

/// The three hooks every awaitable primitive exposes.
pub trait Awaitable {
    /// Value produced on successful consumption.
    type Output;

    /// Returns `true` if [`consume`](Self::consume) would not need to wait.
    fn is_ready(&self) -> bool;

    /// Attaches `awaiter` so that it is resumed once the result is ready.
    fn subscribe(&self, awaiter: Arc<dyn Awaiter>) -> Subscription;

    /// Reads the result, re-raising the stored error if there is one.
    fn consume(&mut self) -> Result<Self::Output>;
}

/// Blocks the current thread until `awaitable` is ready, then consumes it.
///
/// This is the building block of every `join()`/`wait()` style call. Ready
/// handles queued on the current thread run before it parks.
pub fn wait<A: Awaitable>(mut awaitable: A) -> Result<A::Output> {
    if !awaitable.is_ready() {
        let waiter = Arc::new(SyncWait::new());

        if awaitable.subscribe(waiter.clone()) == Subscription::Attached {
            // Work queued on this thread may be what completes `awaitable`.
            while !waiter.is_signaled() && queued::run_ready() {}
            waiter.wait();
        }
    }

    awaitable.consume()
}
