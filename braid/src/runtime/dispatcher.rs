//! Per-thread serialization point.
//!
//! A thread installs a [`Dispatcher`] and from then on other threads can post
//! handles to it. Posted handles are only run while the owning thread is
//! inside [`Dispatcher::pump`], which drives a future to completion and runs
//! posted work in between. [`DispatcherPolicy`](crate::policy::DispatcherPolicy)
//! uses this to pin a computation's resumptions to its home thread.

use super::block_on::drive;
use crate::awaiter::{Handle, SyncWait};
use crate::error::Error;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};

struct Inner {
    /// Handles posted and not yet run.
    queue: Mutex<VecDeque<Handle>>,

    /// Wakes the owning thread while it pumps.
    signal: Arc<SyncWait>,

    /// Cleared once the owning thread uninstalls the dispatcher or exits.
    alive: AtomicBool,

    /// Thread the dispatcher belongs to.
    thread: ThreadId,
}

/// Handle to the dispatcher of a thread.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/// Non-owning reference to a dispatcher, used by policies.
#[derive(Clone, Default)]
pub struct WeakDispatcher {
    inner: Weak<Inner>,
}

/// Keeps the dispatcher installed on the current thread.
///
/// Dropping the guard uninstalls it; pending and future posts then fail with
/// [`Error::HomeThreadEnded`].
pub struct DispatcherGuard {
    dispatcher: Dispatcher,
    _not_send: PhantomData<*const ()>,
}

/// Thread-local slot; marks the dispatcher dead when the thread exits.
struct Installed(Dispatcher);

impl Drop for Installed {
    fn drop(&mut self) {
        self.0.retire();
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Installed>> = const { RefCell::new(None) };
}

impl Dispatcher {
    /// Installs a dispatcher on the current thread.
    ///
    /// If one is already installed, it is returned instead of a new one.
    pub fn install() -> DispatcherGuard {
        let dispatcher = CURRENT.with(|cell| {
            let mut slot = cell.borrow_mut();

            match slot.as_ref() {
                Some(installed) => installed.0.clone(),
                None => {
                    let dispatcher = Dispatcher {
                        inner: Arc::new(Inner {
                            queue: Mutex::new(VecDeque::new()),
                            signal: Arc::new(SyncWait::new()),
                            alive: AtomicBool::new(true),
                            thread: thread::current().id(),
                        }),
                    };

                    tracing::debug!(thread = ?dispatcher.inner.thread, "dispatcher installed");
                    *slot = Some(Installed(dispatcher.clone()));
                    dispatcher
                }
            }
        });

        DispatcherGuard {
            dispatcher,
            _not_send: PhantomData,
        }
    }

    /// Returns the dispatcher installed on the current thread.
    pub fn current() -> Option<Dispatcher> {
        CURRENT.with(|cell| cell.borrow().as_ref().map(|i| i.0.clone()))
    }

    /// Posts `handle` to run on the dispatcher's thread.
    ///
    /// If that thread has ended, the handle is failed with
    /// [`Error::HomeThreadEnded`].
    pub fn post(&self, handle: Handle) {
        {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());

            if self.inner.alive.load(Ordering::Acquire) {
                queue.push_back(handle);
                drop(queue);
                self.inner.signal.signal();
                return;
            }
        }

        handle.fail(Error::HomeThreadEnded);
    }

    /// Drives `future` to completion on the current thread, running posted
    /// handles while it is pending.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the dispatcher's own.
    pub fn pump<F: Future>(&self, future: F) -> F::Output {
        assert!(
            self.is_current_thread(),
            "Dispatcher::pump must run on the dispatcher's thread"
        );

        drive(future, &self.inner.signal, || self.run_pending())
    }

    /// Runs every handle posted so far. Returns `true` if any ran.
    pub fn run_pending(&self) -> bool {
        let mut ran = false;

        loop {
            let next = self
                .inner
                .queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();

            match next {
                Some(handle) => {
                    handle.resume();
                    ran = true;
                }
                None => return ran,
            }
        }
    }

    /// Returns `true` if the dispatcher's thread is still running it.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// Returns `true` if called from the dispatcher's thread.
    pub fn is_current_thread(&self) -> bool {
        self.inner.thread == thread::current().id()
    }

    /// Creates a non-owning reference.
    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn retire(&self) {
        let pending: Vec<_> = {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            self.inner.alive.store(false, Ordering::Release);
            queue.drain(..).collect()
        };

        tracing::debug!(
            thread = ?self.inner.thread,
            pending = pending.len(),
            "dispatcher retired"
        );

        for handle in pending {
            handle.fail(Error::HomeThreadEnded);
        }
    }
}

impl WeakDispatcher {
    /// Returns the dispatcher if its thread is still running it.
    pub fn upgrade(&self) -> Option<Dispatcher> {
        self.inner
            .upgrade()
            .map(|inner| Dispatcher { inner })
            .filter(Dispatcher::is_alive)
    }

    /// Returns `true` if called from the dispatcher's thread.
    pub fn is_current_thread(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.thread == thread::current().id())
    }
}

impl DispatcherGuard {
    /// The installed dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Shorthand for [`Dispatcher::pump`].
    pub fn pump<F: Future>(&self, future: F) -> F::Output {
        self.dispatcher.pump(future)
    }
}

impl Drop for DispatcherGuard {
    fn drop(&mut self) {
        let installed = CURRENT.with(|cell| {
            let mut slot = cell.borrow_mut();
            match slot.as_ref() {
                Some(i) if Arc::ptr_eq(&i.0.inner, &self.dispatcher.inner) => slot.take(),
                _ => None,
            }
        });

        drop(installed);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread", &self.inner.thread)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Debug for WeakDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDispatcher")
            .field("alive", &self.upgrade().is_some())
            .finish()
    }
}
