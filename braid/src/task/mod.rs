//! Coroutine result wrappers.
//!
//! The three wrappers differ in when they start, how many consumers they
//! accept and how they are owned:
//!
//! | Wrapper | Start | Consumers | Ownership |
//! |---|---|---|---|
//! | [`Task`] | eager, per the policy | many | shared, reference counted |
//! | [`Lazy`] | on first consumption | many | shared, reference counted |
//! | [`Subtask`] | while awaited | one | moved |
//!
//! Bodies that panic complete with [`Error::Panicked`](crate::Error::Panicked);
//! every consumer observes the stored error.

mod core;
mod handle;
mod lazy;
mod state;
mod subtask;
mod waker;

pub use handle::Task;
pub use lazy::Lazy;
pub use subtask::Subtask;

use crate::policy::PoolPolicy;
use crate::runtime::ThreadPool;

use std::future::Future;

/// Starts `future` as a [`Task`] under the queued policy.
///
/// The body runs on the current thread up to its first suspension point.
pub fn spawn<F>(future: F) -> Task<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Task::new(future)
}

/// Starts `future` as a [`Task`] on `pool`.
pub fn spawn_on<F>(pool: &ThreadPool, future: F) -> Task<F::Output, PoolPolicy>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Task::with_policy(PoolPolicy::new(pool.clone()), future)
}
