//! Error taxonomy shared by every primitive in the crate.
//!
//! All result-bearing primitives surface failures as [`Error`]. The type is
//! cheap to clone so that a stored error can be re-raised on every consume
//! of a shared result.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error kinds a suspended computation can observe.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The producer went away without completing, a scheduler entry was
    /// cancelled, or a queue/signal was torn down with waiters attached.
    #[error("operation canceled")]
    Canceled,

    /// A value cell was read before it received a value or an error.
    #[error("value is not ready")]
    NotReady,

    /// A callback-style producer tried to yield with no consumer left.
    #[error("no more values can be produced")]
    NoMoreValues,

    /// A dispatcher-bound computation was resumed after its home thread exited.
    #[error("home thread of the dispatcher has ended")]
    HomeThreadEnded,

    /// A frame could not be allocated.
    #[error("frame allocation of {size} bytes failed: {reason}")]
    Allocation { size: usize, reason: &'static str },

    /// A single-awaiter primitive was subscribed twice.
    #[error("result was already awaited")]
    AlreadyAwaited,

    /// A computation body panicked; the payload message is preserved.
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// An error raised by user code.
    #[error(transparent)]
    User(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary user error.
    pub fn user<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::User(Arc::new(error))
    }

    /// Converts a panic payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self::Panicked(message)
    }

    /// Returns `true` for [`Error::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
