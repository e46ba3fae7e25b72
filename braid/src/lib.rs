//! # Braid
//!
//! **Braid** provides the building blocks of structured concurrency on top
//! of Rust futures: computations that suspend, resume and hand results to
//! each other, with the *how* of every resumption made explicit.
//!
//! - **Tasks** ([`Task`], [`Lazy`], [`Subtask`]): wrappers around a body
//!   that differ in when they start and how many consumers they accept,
//! - **Futures** ([`future::pair`]): a single-producer result with one or
//!   many consumers,
//! - **Generators** ([`Generator`]): bodies yielding values on demand,
//!   merged with an [`Aggregator`](generator::Aggregator),
//! - **Queues and signals** ([`sync`]): awaitable MPMC queues, bounded or
//!   not, and broadcast signals,
//! - **Time** ([`time::Scheduler`]): sleeps, cancellable by token, and
//!   drift-free intervals,
//! - **Policies** ([`policy`]): where and when a woken computation runs,
//!   inline, through a per-thread FIFO, on a fresh thread, on a
//!   [`ThreadPool`] or pinned to a thread's [`Dispatcher`].
//!
//! Frames of suspended bodies come from a per-thread size-class pool or
//! from caller-supplied storage, see [`alloc`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use braid::time::{Ident, Scheduler};
//! use std::time::Duration;
//!
//! #[braid::main]
//! async fn main() {
//!     let scheduler = Scheduler::new();
//!     scheduler.start();
//!
//!     let task = braid::spawn(async move {
//!         scheduler.sleep_for(Duration::from_millis(10), Ident::NONE).await?;
//!         Ok::<_, braid::Error>("done")
//!     });
//!
//!     println!("{:?}", task.await);
//! }
//! ```
//!
//! ## Cancellation
//!
//! Cancellation is cooperative. Nothing kills a running body: producers
//! that go away complete their consumers with [`Error::Canceled`], and a
//! body that never suspends cannot be canceled at all.

pub mod alloc;
pub mod awaiter;
pub mod cell;
pub mod config;
pub mod diagnostics;
pub mod future;
pub mod generator;
pub mod policy;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

mod error;

pub use error::{Error, Result};
pub use generator::Generator;
pub use runtime::{Dispatcher, ThreadPool, block_on};
pub use task::{Lazy, Subtask, Task, spawn, spawn_on};

pub use braid_macros::{join, main, test};
