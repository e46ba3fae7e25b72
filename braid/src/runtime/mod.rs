//! Execution substrate.
//!
//! This module hosts the pieces that actually run resumed handles:
//!
//! - [`ThreadPool`]: a work-stealing pool used by [`PoolPolicy`] and the
//!   scheduler,
//! - [`Dispatcher`]: a per-thread serialization point pumped by its owner,
//! - [`block_on`]: the blocking entry point used by every `join()`-style
//!   call and by the `#[braid::main]`/`#[braid::test]` macros.
//!
//! [`PoolPolicy`]: crate::policy::PoolPolicy

mod block_on;
mod builder;
mod context;
mod pool;
mod work_stealing;

pub(crate) mod dispatcher;

pub use block_on::block_on;
pub use builder::PoolBuilder;
pub use dispatcher::{Dispatcher, DispatcherGuard};
pub use pool::ThreadPool;
