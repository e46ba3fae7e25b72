use super::Awaiter;
use crate::error::Error;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

type Callback = Box<dyn FnOnce() + Send>;

/// An awaiter that runs a plain function when resumed.
///
/// If the function panics, the panic is captured into the awaiter's local
/// error slot rather than unwinding into the publisher; it can be inspected
/// afterwards with [`take_error`](Self::take_error).
pub struct CallbackAwaiter {
    callback: Mutex<Option<Callback>>,
    error: Mutex<Option<Error>>,
}

impl CallbackAwaiter {
    /// Wraps `callback` into an awaiter.
    pub fn new<F>(callback: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(Self {
            callback: Mutex::new(Some(Box::new(callback))),
            error: Mutex::new(None),
        })
    }

    /// Takes the error captured while running the callback, if any.
    pub fn take_error(&self) -> Option<Error> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Awaiter for CallbackAwaiter {
    fn resume(self: Arc<Self>) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(callback) = callback else {
            return;
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
            let error = Error::from_panic(payload);
            tracing::debug!(%error, "awaiter callback failed");
            *self.error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        }
    }
}
