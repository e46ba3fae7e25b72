//! Work-stealing queues backing the [`ThreadPool`](super::ThreadPool).
//!
//! - [`injector`]: a global queue for handles enqueued from outside the pool,
//! - [`queue`]: per-worker local queues used for fast local execution and
//!   stealing.

pub(crate) mod injector;
pub(crate) mod queue;
