//! Awaitable queues and broadcast signals.
//!
//! - [`Queue`]: unbounded multi-producer multi-consumer queue,
//! - [`BoundedQueue`]: the same with a capacity; pushing into a full queue
//!   suspends the producer,
//! - [`Signal`] and [`Listener`]: broadcast of values to every waiting
//!   listener.
//!
//! Queues protect their state with a mutex and wake suspended parties only
//! after releasing it. Signals manipulate a lock-free chain of subscribers.
//! Tearing any of them down resumes whoever is still waiting with
//! [`Error::Canceled`](crate::Error::Canceled).

mod bounded;
mod queue;
mod signal;
mod waiter;

pub use bounded::{BoundedQueue, Push};
pub use queue::{Pop, Queue};
pub use signal::{Listener, Recv, Signal};
