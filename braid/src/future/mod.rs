//! Promise/deferred pairs.
//!
//! A [`Promise`] is the single write capability of a result; a
//! [`Deferred`] is its single consumer and a [`SharedDeferred`] lets any
//! number of consumers await the same result. Completion publishes the
//! result first and resumes the waiting consumers afterwards, so no
//! resumed consumer can observe a missing value.
//!
//! ```
//! let (promise, deferred) = braid::future::pair();
//!
//! std::thread::spawn(move || promise.set_value(7));
//!
//! assert_eq!(deferred.wait().unwrap(), 7);
//! ```

mod deferred;
mod promise;

pub(crate) mod shared;

pub use deferred::{Deferred, SharedDeferred};
pub use promise::{Promise, pair};
