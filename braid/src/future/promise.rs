use super::Deferred;
use super::shared::Shared;
use crate::error::{Error, Result};

use std::fmt;
use std::sync::Arc;

/// Creates a connected promise and deferred result.
pub fn pair<T>() -> (Promise<T>, Deferred<T>) {
    let shared = Arc::new(Shared::new());

    (
        Promise {
            shared: Some(shared.clone()),
        },
        Deferred::from_shared(shared),
    )
}

/// Write capability of a deferred result.
///
/// Exactly one of setting a value, setting an error or dropping the promise
/// applies. Dropping it without completing cancels the result.
pub struct Promise<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Promise<T> {
    /// Completes the result. Returns `false` if it was already completed.
    pub fn complete(mut self, result: Result<T>) -> bool {
        match self.shared.take() {
            Some(shared) => shared.complete(result),
            None => false,
        }
    }

    pub fn set_value(self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn set_error(self, error: Error) -> bool {
        self.complete(Err(error))
    }

    /// Returns `true` once no consumer can observe the result any more.
    pub fn is_canceled(&self) -> bool {
        self.shared
            .as_ref()
            .is_none_or(|shared| Arc::strong_count(shared) == 1)
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if shared.complete(Err(Error::Canceled)) {
                tracing::trace!("promise dropped without completion");
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}
