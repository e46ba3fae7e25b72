use crate::runtime::pool::PoolShared;
use crate::runtime::work_stealing::queue::LocalQueue;

use std::cell::RefCell;
use std::sync::{Arc, Weak};

/// Identity of the pool worker running on the current thread.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    /// Pool the worker belongs to.
    pub(crate) pool: Weak<PoolShared>,

    /// Index of the worker inside the pool.
    pub(crate) id: usize,

    /// Local queues of every worker of the pool.
    pub(crate) locals: Arc<Vec<Arc<LocalQueue>>>,
}

thread_local! {
    /// Worker context of the current thread, if it belongs to a pool.
    pub(crate) static CURRENT_WORKER: RefCell<Option<WorkerContext>> =
        const { RefCell::new(None) };
}

/// Installs `worker` as the current thread's context for the duration of
/// `f`, restoring the previous context afterwards.
pub(crate) fn enter_context<R>(worker: WorkerContext, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_WORKER.with(|cell| cell.replace(Some(worker)));

    let out = f();

    CURRENT_WORKER.with(|cell| cell.replace(previous));
    out
}

/// Runs `f` with the current worker context, if any.
pub(crate) fn with_worker<R>(f: impl FnOnce(Option<&WorkerContext>) -> R) -> R {
    CURRENT_WORKER.with(|cell| f(cell.borrow().as_ref()))
}
