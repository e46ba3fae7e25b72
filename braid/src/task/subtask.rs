use crate::alloc::{Frame, Storage};
use crate::error::{Error, Result};

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

enum Stage<'s, T> {
    Ready(Result<T>),
    Running(Frame<'s, T>),
    Done,
}

/// A lazily started computation with exactly one consumer.
///
/// The body runs only while its owner awaits it, polled in place on the
/// owner's stack with no reference counting and no scheduling. A subtask
/// that is never awaited never runs. [`Subtask::ready`] and
/// [`Subtask::failed`] build already complete subtasks without allocating
/// a frame.
pub struct Subtask<'s, T> {
    stage: Stage<'s, T>,
}

impl<T> Subtask<'static, T> {
    /// Places `future` in a pooled frame.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        match Frame::new(future) {
            Ok(frame) => Self {
                stage: Stage::Running(frame),
            },
            Err(error) => Self::failed(error),
        }
    }
}

impl<'s, T> Subtask<'s, T> {
    /// Places `future` in memory provided by `storage`.
    ///
    /// Fails when the storage cannot hold the frame.
    pub fn new_in<S, F>(storage: &'s S, future: F) -> Result<Self>
    where
        S: Storage,
        F: Future<Output = T> + Send + 's,
    {
        Ok(Self {
            stage: Stage::Running(Frame::new_in(storage, future)?),
        })
    }

    pub fn ready(value: T) -> Self {
        Self {
            stage: Stage::Ready(Ok(value)),
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            stage: Stage::Ready(Err(error)),
        }
    }

    /// Returns `true` if awaiting would complete without running anything.
    pub fn is_ready(&self) -> bool {
        matches!(self.stage, Stage::Ready(_))
    }

    /// Runs the body on the current thread until it completes.
    pub fn join(self) -> Result<T> {
        crate::block_on(self)
    }
}

// The body lives in its heap-placed frame; no field is structurally pinned.
impl<T> Unpin for Subtask<'_, T> {}

impl<T> Future for Subtask<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let result = match &mut this.stage {
            Stage::Running(frame) => {
                match panic::catch_unwind(AssertUnwindSafe(|| frame.poll(cx))) {
                    Ok(Poll::Pending) => return Poll::Pending,
                    Ok(Poll::Ready(value)) => Ok(value),
                    Err(payload) => Err(Error::from_panic(payload)),
                }
            }
            Stage::Ready(_) => match std::mem::replace(&mut this.stage, Stage::Done) {
                Stage::Ready(result) => return Poll::Ready(result),
                _ => Err(Error::AlreadyAwaited),
            },
            Stage::Done => Err(Error::AlreadyAwaited),
        };

        // Dropping the frame here releases it before the owner resumes.
        this.stage = Stage::Done;
        Poll::Ready(result)
    }
}

impl<T> fmt::Debug for Subtask<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match &self.stage {
            Stage::Ready(_) => "ready",
            Stage::Running(_) => "running",
            Stage::Done => "done",
        };

        f.debug_struct("Subtask").field("stage", &stage).finish()
    }
}
