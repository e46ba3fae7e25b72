use super::Dispatcher;
use crate::awaiter::SyncWait;
use crate::policy::queued;

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Runs a future to completion, blocking the current thread.
///
/// While the future is pending, the thread keeps draining its queued-policy
/// FIFO so that computations resumed onto this thread make progress. On a
/// thread with an installed [`Dispatcher`], this is the same as
/// [`Dispatcher::pump`].
///
/// # Examples
///
/// ```rust,ignore
/// let value = braid::block_on(async { 42 });
/// assert_eq!(value, 42);
/// ```
pub fn block_on<F: Future>(future: F) -> F::Output {
    if let Some(dispatcher) = Dispatcher::current() {
        return dispatcher.pump(future);
    }

    let signal = Arc::new(SyncWait::new());
    drive(future, &signal, || false)
}

/// Polls `future` until ready, running `extra` and the queued FIFO between
/// polls and sleeping on `signal` when there is nothing left to do.
///
/// The FIFO is run even when an outer drain is active on this thread, since
/// that drain is suspended below this call.
pub(crate) fn drive<F, R>(future: F, signal: &Arc<SyncWait>, mut extra: R) -> F::Output
where
    F: Future,
    R: FnMut() -> bool,
{
    let mut future = pin!(future);
    let waker = Waker::from(signal.clone());
    let mut cx = Context::from_waker(&waker);

    loop {
        if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
            return output;
        }

        loop {
            let ran_queued = queued::run_ready();
            let ran_extra = extra();

            if !ran_queued && !ran_extra {
                break;
            }

            if signal.is_signaled() {
                break;
            }
        }

        signal.wait();
    }
}
