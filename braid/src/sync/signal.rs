//! Broadcast signals.
//!
//! A [`Signal`] is the publishing side; [`Listener`]s subscribe one wait at
//! a time. Publication detaches the current set of subscribers and delivers
//! the value to each of them in turn, so a listener that subscribes again
//! while a value is being delivered waits for the next publication.

use crate::awaiter::chain::Chain;
use crate::error::{Error, Result};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

trait Subscriber<T>: Send + Sync {
    /// Hands a publication (or the teardown error) to the subscriber.
    fn deliver(self: Arc<Self>, value: &Result<T>, inner: &Arc<Inner<T>>);

    /// Takes the subscription out of the waiting count.
    ///
    /// Returns `false` if it was already withdrawn, in which case nothing
    /// must be delivered.
    fn claim(&self) -> bool {
        true
    }
}

struct Inner<T> {
    chain: Chain<dyn Subscriber<T>>,
    sources: AtomicUsize,
    pending: AtomicUsize,
}

impl<T> Inner<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            chain: Chain::new(),
            sources: AtomicUsize::new(1),
            pending: AtomicUsize::new(0),
        })
    }

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) -> bool {
        self.pending.fetch_add(1, Ordering::AcqRel);

        if self.chain.subscribe(subscriber).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }

        true
    }

    fn publish(self: &Arc<Self>, value: Result<T>, close: bool) -> usize {
        let detached = if close {
            self.chain.close()
        } else {
            self.chain.take()
        };

        let mut delivered = 0;

        for subscriber in detached {
            if !subscriber.claim() {
                continue;
            }

            self.pending.fetch_sub(1, Ordering::AcqRel);
            subscriber.deliver(&value, self);
            delivered += 1;
        }

        delivered
    }
}

/// Publishing side of a broadcast signal.
///
/// Clones publish into the same signal. When the last clone is dropped,
/// every listener still waiting resumes with [`Error::Canceled`].
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Inner::new(),
        }
    }

    /// Delivers `value` to every listener currently waiting.
    ///
    /// Returns how many subscribers were reached.
    pub fn emit(&self, value: T) -> usize {
        let delivered = self.inner.publish(Ok(value), false);
        tracing::trace!(delivered, "signal emitted");
        delivered
    }

    /// Creates a listener bound to this signal.
    pub fn listen(&self) -> Listener<T> {
        Listener {
            binding: Binding::Bound(self.inner.clone()),
            node: None,
        }
    }

    /// Invokes `callback` on every publication for as long as it returns
    /// `true`.
    pub fn connect<F>(&self, callback: F) -> bool
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.inner.subscribe(Arc::new(CallbackNode {
            callback: Mutex::new(Box::new(callback)),
        }))
    }

    /// Number of subscriptions waiting for the next publication.
    pub fn listener_count(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        self.inner.sources.fetch_add(1, Ordering::Relaxed);

        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Drop for Signal<T> {
    fn drop(&mut self) {
        if self.inner.sources.fetch_sub(1, Ordering::AcqRel) == 1 {
            let canceled = self.inner.publish(Err(Error::Canceled), true);
            tracing::debug!(canceled, "signal dropped");
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("pending", &self.inner.pending.load(Ordering::Relaxed))
            .finish()
    }
}

/// One pending wait of a [`Listener`].
struct ListenerNode<T> {
    delivery: Mutex<Option<Result<T>>>,
    waker: Mutex<Option<Waker>>,
    /// Set by whichever comes first: a publication or the listener's drop.
    claimed: AtomicBool,
}

impl<T> ListenerNode<T> {
    fn new(waker: &Waker) -> Self {
        Self {
            delivery: Mutex::new(None),
            waker: Mutex::new(Some(waker.clone())),
            claimed: AtomicBool::new(false),
        }
    }

    fn try_claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    fn take_delivery(&self) -> Option<Result<T>> {
        self.delivery.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock().unwrap_or_else(|e| e.into_inner());

        match slot.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }
}

impl<T: Clone + Send> Subscriber<T> for ListenerNode<T> {
    fn deliver(self: Arc<Self>, value: &Result<T>, _inner: &Arc<Inner<T>>) {
        *self.delivery.lock().unwrap_or_else(|e| e.into_inner()) = Some(value.clone());

        let waker = self.waker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn claim(&self) -> bool {
        self.try_claim()
    }
}

type Callback<T> = Box<dyn FnMut(&T) -> bool + Send>;

/// Subscription that runs a plain function on each publication.
struct CallbackNode<T> {
    callback: Mutex<Callback<T>>,
}

impl<T: Send + 'static> Subscriber<T> for CallbackNode<T> {
    fn deliver(self: Arc<Self>, value: &Result<T>, inner: &Arc<Inner<T>>) {
        let Ok(value) = value else {
            return;
        };

        let keep = (self.callback.lock().unwrap_or_else(|e| e.into_inner()))(value);

        if keep {
            inner.subscribe(self);
        }
    }
}

type Register<T> = Box<dyn FnOnce(Signal<T>) + Send>;

enum Binding<T> {
    Bound(Arc<Inner<T>>),
    Dormant(Option<Register<T>>),
}

/// Consuming side of a [`Signal`].
///
/// Each [`recv`](Self::recv) waits for one publication. A listener created
/// with [`dormant`](Self::dormant) has no signal until it first waits.
pub struct Listener<T> {
    binding: Binding<T>,
    node: Option<Arc<ListenerNode<T>>>,
}

impl<T: Clone + Send + 'static> Listener<T> {
    /// Creates a listener whose signal is allocated on the first wait.
    ///
    /// `register` receives the publishing side once the listener is already
    /// subscribed, so a value emitted from inside it is not missed.
    pub fn dormant<F>(register: F) -> Self
    where
        F: FnOnce(Signal<T>) + Send + 'static,
    {
        Self {
            binding: Binding::Dormant(Some(Box::new(register))),
            node: None,
        }
    }

    /// Waits for the next publication.
    pub fn recv(&mut self) -> Recv<'_, T> {
        Recv { listener: self }
    }

    /// Returns `true` once the listener is attached to a signal.
    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Result<T>> {
        if let Some(node) = &self.node {
            node.register(cx.waker());

            return match node.take_delivery() {
                Some(result) => {
                    self.node = None;
                    Poll::Ready(result)
                }
                None => Poll::Pending,
            };
        }

        let mut register = None;

        let inner = match &mut self.binding {
            Binding::Bound(inner) => inner.clone(),
            Binding::Dormant(pending) => {
                register = pending.take();
                let inner = Inner::new();
                self.binding = Binding::Bound(inner.clone());
                inner
            }
        };

        let node = Arc::new(ListenerNode::new(cx.waker()));

        if !inner.subscribe(node.clone()) {
            return Poll::Ready(Err(Error::Canceled));
        }

        self.node = Some(node.clone());

        if let Some(register) = register {
            // Hand over the source created above; the listener holds none.
            register(Signal { inner });
        } else {
            drop(inner);
        }

        match node.take_delivery() {
            Some(result) => {
                self.node = None;
                Poll::Ready(result)
            }
            None => Poll::Pending,
        }
    }
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        let (Some(node), Binding::Bound(inner)) = (&self.node, &self.binding) else {
            return;
        };

        // An abandoned wait leaves its node in the chain until the next
        // publication skips it; it stops counting right away.
        if node.try_claim() {
            inner.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("bound", &matches!(self.binding, Binding::Bound(_)))
            .field("waiting", &self.node.is_some())
            .finish()
    }
}

/// Future returned by [`Listener::recv`].
#[must_use = "futures do nothing unless awaited"]
pub struct Recv<'a, T> {
    listener: &'a mut Listener<T>,
}

impl<T: Clone + Send + 'static> Future for Recv<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().listener.poll_recv(cx)
    }
}
