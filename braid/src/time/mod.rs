//! Timed completions.
//!
//! The [`Scheduler`] completes promises once their deadline passed.
//! Sleeping is therefore just awaiting a [`Deferred`](crate::future::Deferred)
//! the scheduler completes, and canceling a sleep completes it early with
//! an error.

mod entry;
mod ident;
mod scheduler;

pub use ident::Ident;
pub use scheduler::Scheduler;
