use super::Awaiter;

use std::sync::{Arc, Condvar, Mutex};
use std::task::Wake;
use std::time::{Duration, Instant};

/// An awaiter that blocks a thread until it is resumed.
///
/// `SyncWait` holds a signaled flag guarded by a mutex and a condition
/// variable. Resuming it sets the flag; [`wait`](Self::wait) blocks until the
/// flag is observed. It also implements [`Wake`], so it can serve as the waker
/// of a future driven from a blocking call.
#[derive(Debug, Default)]
pub struct SyncWait {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl SyncWait {
    /// Creates an unsignaled waiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the waiter as signaled and wakes any blocked thread.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        *signaled = true;
        self.condvar.notify_all();
    }

    /// Returns `true` if the waiter was signaled and not yet reset.
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until signaled, then clears the flag.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(|e| e.into_inner());

        while !*signaled {
            signaled = self
                .condvar
                .wait(signaled)
                .unwrap_or_else(|e| e.into_inner());
        }

        *signaled = false;
    }

    /// Blocks until signaled or until `timeout` elapses.
    ///
    /// Returns `true` if the waiter was signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock().unwrap_or_else(|e| e.into_inner());

        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            signaled = self
                .condvar
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }

        *signaled = false;
        true
    }
}

impl Awaiter for SyncWait {
    fn resume(self: Arc<Self>) {
        self.signal();
    }
}

impl Wake for SyncWait {
    fn wake(self: Arc<Self>) {
        self.signal();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.signal();
    }
}
