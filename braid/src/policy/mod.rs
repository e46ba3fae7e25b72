//! Resumption policies.
//!
//! A policy decides *how* a suspended computation re-enters execution once
//! something wakes it. Policies are plain values passed as type parameters
//! to the coroutine wrappers; they carry whatever external dependency they
//! need (a pool, a dispatcher) and expose a small fixed capability set:
//!
//! - [`Policy::initial`]: whether a new computation starts right away or
//!   waits to be started,
//! - [`Policy::resume`]: bring a handle back to execution,
//! - [`Policy::resume_handle`]: symmetric-transfer variant,
//! - [`Policy::can_block`]: whether blocking the current thread is safe,
//! - [`Policy::resume_handle_next`]: the next ready handle on this thread.
//!
//! Built-in policies: [`Inline`], [`Queued`], [`Parallel`], [`PoolPolicy`]
//! and [`DispatcherPolicy`].

mod dispatcher;
mod inline;
mod parallel;
mod pool;

pub(crate) mod queued;

pub use dispatcher::DispatcherPolicy;
pub use inline::Inline;
pub use parallel::Parallel;
pub use pool::PoolPolicy;
pub use queued::Queued;

use crate::awaiter::Handle;

/// How a computation behaves right after it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    /// The computation is resumed through the policy immediately.
    Immediate,

    /// The computation stays suspended until something starts it.
    Suspended,
}

/// Strategy deciding how a handle is brought back to execution.
pub trait Policy: Send + Sync + 'static {
    /// Start behaviour of a computation governed by this policy.
    fn initial(&self) -> Start {
        Start::Immediate
    }

    /// Causes `handle` to be resumed according to the policy.
    fn resume(&self, handle: Handle);

    /// Symmetric-transfer variant of [`resume`](Self::resume).
    ///
    /// Returns the handle the caller should run next, if any. The default
    /// schedules `handle` through [`resume`](Self::resume) and returns
    /// nothing.
    fn resume_handle(&self, handle: Handle) -> Option<Handle> {
        self.resume(handle);
        None
    }

    /// Returns `true` if blocking the current thread is safe.
    fn can_block(&self) -> bool {
        true
    }

    /// Returns the next handle ready to run on the current thread.
    fn resume_handle_next(&self) -> Option<Handle> {
        None
    }
}

/// Supplies external dependencies to a policy after construction.
///
/// Returns `true` if a computation that was kept suspended for lack of the
/// dependency must now be resumed.
pub trait Initialize<Args> {
    fn initialize_policy(&self, args: Args) -> bool;
}
