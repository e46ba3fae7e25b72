use super::state::{COMPLETED, IDLE, NOTIFIED, QUEUED, RUNNING};
use super::waker::make_waker;
use crate::alloc::Frame;
use crate::awaiter::{Handle, Resumable};
use crate::error::{Error, Result};
use crate::future::shared::Shared;
use crate::policy::Policy;

use std::cell::UnsafeCell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// The scheduled half of a task: its frame, its policy and the state it
/// publishes into.
///
/// Resuming polls the frame once. Wakes go back through the policy, and a
/// wake that lands while the frame is being polled is remembered and
/// replayed after the poll returns.
pub(crate) struct TaskCore<T, P> {
    state: AtomicUsize,
    frame: UnsafeCell<Option<Frame<'static, T>>>,
    shared: Arc<Shared<T>>,
    policy: P,
    started: AtomicBool,
    canceled: AtomicBool,
}

// Safety: the frame is only touched by the thread that moved the state to
// `RUNNING`.
unsafe impl<T: Send, P: Send> Send for TaskCore<T, P> {}
unsafe impl<T: Send, P: Sync> Sync for TaskCore<T, P> {}

impl<T, P> TaskCore<T, P> {
    pub(crate) fn shared(&self) -> &Arc<Shared<T>> {
        &self.shared
    }

    pub(crate) fn policy(&self) -> &P {
        &self.policy
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Makes a task that has not run yet complete with [`Error::Canceled`]
    /// instead of running its body.
    pub(crate) fn mark_canceled(&self) {
        self.canceled.store(true, Ordering::Release);
    }
}

impl<T: Send + 'static, P: Policy> TaskCore<T, P> {
    /// Places `future` in a pooled frame.
    ///
    /// An allocation failure completes the task with the error right away.
    pub(crate) fn new<F>(policy: P, future: F) -> Arc<Self>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let shared = Arc::new(Shared::new());

        let frame = match Frame::new(future) {
            Ok(frame) => Some(frame),
            Err(error) => {
                tracing::warn!(%error, "task frame allocation failed");
                shared.complete(Err(error));
                None
            }
        };

        let state = if frame.is_some() { QUEUED } else { COMPLETED };

        Arc::new(Self {
            state: AtomicUsize::new(state),
            frame: UnsafeCell::new(frame),
            shared,
            policy,
            started: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
        })
    }

    /// Hands the task to its policy for the first time.
    ///
    /// Returns `false` if it was already started.
    pub(crate) fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::AcqRel) {
            return false;
        }

        if self.state.load(Ordering::Acquire) == COMPLETED {
            return true;
        }

        tracing::trace!("task started");
        self.schedule();
        true
    }

    fn schedule(self: &Arc<Self>) {
        let handle: Handle = self.clone();

        if let Some(next) = self.policy.resume_handle(handle) {
            next.resume();
        }
    }

    /// Polls the frame once.
    fn run(self: Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);

        if current != QUEUED && current != NOTIFIED {
            return;
        }

        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if self.canceled.load(Ordering::Acquire) {
            self.finish(Err(Error::Canceled));
            return;
        }

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the `RUNNING` state grants exclusive access to the frame.
        let frame = unsafe { &mut *self.frame.get() };

        let Some(frame) = frame.as_mut() else {
            self.state.store(COMPLETED, Ordering::Release);
            return;
        };

        let poll = panic::catch_unwind(AssertUnwindSafe(|| frame.poll(&mut cx)));

        match poll {
            Ok(Poll::Pending) => {
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    // Woken during the poll.
                    self.state.store(QUEUED, Ordering::Release);
                    self.schedule();
                }
            }
            Ok(Poll::Ready(value)) => self.finish(Ok(value)),
            Err(payload) => {
                let error = Error::from_panic(payload);
                tracing::debug!(%error, "task body panicked");
                self.finish(Err(error));
            }
        }
    }

    /// Drops the frame and publishes `result`. Caller holds `RUNNING`.
    fn finish(&self, result: Result<T>) {
        // Safety: the caller is the `RUNNING` owner.
        drop(unsafe { (*self.frame.get()).take() });

        self.state.store(COMPLETED, Ordering::Release);
        self.shared.complete(result);
    }

    /// Schedules the task again after a wake.
    pub(crate) fn wake(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.schedule();
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }
}

impl<T: Send + 'static, P: Policy> Resumable for TaskCore<T, P> {
    fn resume(self: Arc<Self>) {
        self.run();
    }

    fn fail(self: Arc<Self>, error: Error) {
        for from in [QUEUED, NOTIFIED, IDLE] {
            if self
                .state
                .compare_exchange(from, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::debug!(%error, "task resumption failed");
                self.finish(Err(error));
                return;
            }
        }
    }
}

impl<T, P> Drop for TaskCore<T, P> {
    fn drop(&mut self) {
        drop(self.frame.get_mut().take());
        self.shared.complete(Err(Error::Canceled));
    }
}
