//! Lock-free LIFO chain of awaiters.
//!
//! A chain is an atomic pointer to the top of a singly linked stack.
//! Subscribing pushes with a compare-exchange; broadcasting swaps the head
//! out and walks the detached list, so subscribers arriving during a
//! broadcast land on a fresh chain. Resume order is therefore the reverse
//! of subscription order.
//!
//! A chain can be *closed*: the head is replaced by a sentinel and every
//! later subscription reports that the state is already complete.

use super::Awaiter;

use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Link<A: ?Sized> {
    awaiter: Arc<A>,
    next: *mut Link<A>,
}

/// Sentinel stored in the head once the chain is closed.
fn closed<A: ?Sized>() -> *mut Link<A> {
    ptr::dangling_mut()
}

pub(crate) struct Chain<A: ?Sized = dyn Awaiter> {
    head: AtomicPtr<Link<A>>,
}

unsafe impl<A: ?Sized + Send + Sync> Send for Chain<A> {}
unsafe impl<A: ?Sized + Send + Sync> Sync for Chain<A> {}

impl<A: ?Sized> Chain<A> {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Pushes `awaiter` on top of the chain.
    ///
    /// Returns the awaiter back if the chain was already closed.
    pub(crate) fn subscribe(&self, awaiter: Arc<A>) -> Result<(), Arc<A>> {
        let link = Box::into_raw(Box::new(Link {
            awaiter,
            next: ptr::null_mut(),
        }));

        let mut top = self.head.load(Ordering::Relaxed);

        loop {
            if top == closed() {
                // Safety: `link` was never published.
                let link = unsafe { Box::from_raw(link) };
                return Err(link.awaiter);
            }

            // Safety: `link` is still exclusively owned by this thread.
            unsafe { (*link).next = top };

            match self
                .head
                .compare_exchange_weak(top, link, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(current) => top = current,
            }
        }
    }

    /// Detaches every subscriber and leaves the chain open.
    ///
    /// A closed chain stays closed and yields nothing.
    pub(crate) fn take(&self) -> Detached<A> {
        let mut top = self.head.load(Ordering::Relaxed);

        loop {
            if top.is_null() || top == closed() {
                return Detached::empty();
            }

            match self.head.compare_exchange_weak(
                top,
                ptr::null_mut(),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Detached { cursor: top },
                Err(current) => top = current,
            }
        }
    }

    /// Detaches every subscriber and closes the chain for good.
    pub(crate) fn close(&self) -> Detached<A> {
        let top = self.head.swap(closed(), Ordering::AcqRel);

        if top == closed() {
            Detached::empty()
        } else {
            Detached { cursor: top }
        }
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.head.load(Ordering::Acquire) == closed()
    }
}

impl Chain<dyn Awaiter> {
    /// Closes the chain and resumes every detached awaiter exactly once.
    pub(crate) fn resume_all(&self) {
        for awaiter in self.close() {
            awaiter.resume();
        }
    }
}

impl<A: ?Sized> Drop for Chain<A> {
    fn drop(&mut self) {
        let top = *self.head.get_mut();

        if top != closed() {
            drop(Detached { cursor: top });
        }
    }
}

/// A list of awaiters removed from a chain, most recent subscriber first.
pub(crate) struct Detached<A: ?Sized> {
    cursor: *mut Link<A>,
}

unsafe impl<A: ?Sized + Send + Sync> Send for Detached<A> {}

impl<A: ?Sized> Detached<A> {
    fn empty() -> Self {
        Self {
            cursor: ptr::null_mut(),
        }
    }
}

impl<A: ?Sized> Iterator for Detached<A> {
    type Item = Arc<A>;

    fn next(&mut self) -> Option<Arc<A>> {
        if self.cursor.is_null() {
            return None;
        }

        // Safety: every link in a detached list is owned by this iterator.
        let link = unsafe { Box::from_raw(self.cursor) };
        self.cursor = link.next;

        Some(link.awaiter)
    }
}

impl<A: ?Sized> Drop for Detached<A> {
    fn drop(&mut self) {
        for _ in self.by_ref() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Awaiter for Recorder {
        fn resume(self: Arc<Self>) {
            self.log.lock().unwrap().push(self.id);
        }
    }

    fn recorder(id: usize, log: &Arc<Mutex<Vec<usize>>>) -> Arc<dyn Awaiter> {
        Arc::new(Recorder {
            id,
            log: log.clone(),
        })
    }

    #[test]
    fn resumes_in_reverse_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = Chain::new();

        for id in 1..=3 {
            assert!(chain.subscribe(recorder(id, &log)).is_ok());
        }

        chain.resume_all();
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn closed_chain_rejects_subscribers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = Chain::new();

        chain.resume_all();
        assert!(chain.is_closed());
        assert!(chain.subscribe(recorder(1, &log)).is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn take_keeps_chain_open() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Chain = Chain::new();

        chain.subscribe(recorder(1, &log)).ok();
        let detached: Vec<_> = chain.take().collect();
        assert_eq!(detached.len(), 1);
        assert!(!chain.is_closed());
        assert!(chain.subscribe(recorder(2, &log)).is_ok());
    }

    #[test]
    fn concurrent_subscribers_are_all_resumed_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<Chain> = Arc::new(Chain::new());

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let chain = chain.clone();
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        chain.subscribe(recorder(t * 100 + i, &log)).ok();
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        chain.resume_all();

        let mut seen = log.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..800).collect::<Vec<_>>());
    }
}
