use super::co::{Co, SharedSlot, lock, new_slot};
use crate::alloc::Frame;
use crate::error::{Error, Result};
use crate::policy::Inline;
use crate::task::Task;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A body producing a sequence of values on demand.
///
/// The body receives a [`Co`] handle and hands out values with
/// `co.yield_(value).await`. It runs only while the consumer asks for the
/// next item, polled on the consumer's side with no queueing in between,
/// and may await anything else in the meantime. Returning `Err` from the
/// body, or panicking, surfaces the error on the next request.
///
/// ```
/// use braid::Generator;
///
/// let squares = Generator::new(|co| async move {
///     for i in 1..=3u32 {
///         co.yield_(i * i).await;
///     }
///     Ok(())
/// });
///
/// let values: Vec<u32> = squares.into_iter().map(Result::unwrap).collect();
/// assert_eq!(values, [1, 4, 9]);
/// ```
pub struct Generator<T> {
    frame: Option<Frame<'static, Result<()>>>,
    slot: SharedSlot<T>,
    current: Option<T>,
    failure: Option<Error>,
}

impl<T: Send + 'static> Generator<T> {
    pub fn new<B, F>(body: B) -> Self
    where
        B: FnOnce(Co<T>) -> F,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let slot = new_slot();
        let co = Co::new(slot.clone());

        let (frame, failure) = match Frame::new(body(co)) {
            Ok(frame) => (Some(frame), None),
            Err(error) => (None, Some(error)),
        };

        Self {
            frame,
            slot,
            current: None,
            failure,
        }
    }

    /// Binds `callback` to the next item.
    ///
    /// The generator is driven in the background and `callback` receives
    /// it back together with the item, or learns that the sequence ended.
    /// The callback always runs exactly once, with
    /// [`Error::Canceled`] if the driving computation is torn down.
    pub fn charge<C>(self, callback: C)
    where
        C: FnOnce(Charge<T>) + Send + 'static,
    {
        let mut guard = ChargeGuard {
            callback: Some(callback),
            _item: PhantomData,
        };

        let _ = Task::with_policy(Inline, async move {
            let mut generator = self;

            let charge = match generator.next().await {
                Ok(true) => match generator.take_value() {
                    Some(value) => Charge::Item(generator, value),
                    None => Charge::Done,
                },
                Ok(false) => Charge::Done,
                Err(error) => Charge::Failed(error),
            };

            guard.fire(charge);
        });
    }
}

impl<T> Generator<T> {
    /// Drives the body to its next item.
    ///
    /// Resolves to `true` when an item is available through
    /// [`value`](Self::value), `false` once the sequence ended.
    pub fn next(&mut self) -> Next<'_, T> {
        Next { generator: self }
    }

    /// The most recent item.
    pub fn value(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Moves the most recent item out.
    pub fn take_value(&mut self) -> Option<T> {
        self.current.take()
    }

    /// Returns `true` once the body returned and every item was handed out.
    pub fn is_finished(&self) -> bool {
        self.frame.is_none() && self.failure.is_none() && lock(&self.slot).item.is_none()
    }

    /// Blocks until the next item, returning `None` at the end.
    pub fn next_blocking(&mut self) -> Result<Option<T>> {
        if crate::block_on(self.next())? {
            Ok(self.take_value())
        } else {
            Ok(None)
        }
    }

    /// Iterates by blocking on each item.
    pub fn iter(&mut self) -> Iter<'_, T> {
        Iter { generator: self }
    }

    fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool>> {
        self.current = None;

        if let Some(error) = self.failure.take() {
            return Poll::Ready(Err(error));
        }

        {
            let mut slot = lock(&self.slot);

            if let Some(value) = slot.item.take() {
                self.current = Some(value);
                return Poll::Ready(Ok(true));
            }

            slot.waiting = true;
            slot.consumer = Some(cx.waker().clone());
        }

        let Some(frame) = self.frame.as_mut() else {
            return Poll::Ready(Ok(false));
        };

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| frame.poll(cx))) {
            Ok(Poll::Pending) => None,
            Ok(Poll::Ready(result)) => Some(result),
            Err(payload) => Some(Err(Error::from_panic(payload))),
        };

        if let Some(result) = &outcome {
            tracing::trace!(ok = result.is_ok(), "generator body returned");
            self.frame = None;
        }

        let mut slot = lock(&self.slot);

        if outcome.is_some() {
            slot.closed = true;
            slot.waiting = false;
            slot.consumer = None;
        }

        if let Some(value) = slot.item.take() {
            slot.waiting = false;
            self.current = Some(value);

            if let Some(Err(error)) = outcome {
                self.failure = Some(error);
            }

            return Poll::Ready(Ok(true));
        }

        match outcome {
            None => Poll::Pending,
            Some(Ok(())) => Poll::Ready(Ok(false)),
            Some(Err(error)) => Poll::Ready(Err(error)),
        }
    }
}

impl<T> Drop for Generator<T> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        slot.closed = true;
        slot.waiting = false;
        slot.consumer = None;
    }
}

impl<T> fmt::Debug for Generator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("running", &self.frame.is_some())
            .finish()
    }
}

/// Future returned by [`Generator::next`].
#[must_use = "the generator only advances when this is awaited"]
pub struct Next<'a, T> {
    generator: &'a mut Generator<T>,
}

impl<T> Future for Next<'_, T> {
    type Output = Result<bool>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().generator.poll_next(cx)
    }
}

/// What a charged generator hands to its callback.
pub enum Charge<T> {
    /// An item, together with the generator to charge again.
    Item(Generator<T>, T),
    /// The sequence ended.
    Done,
    /// The body failed.
    Failed(Error),
}

impl<T> fmt::Debug for Charge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(..) => f.write_str("Item"),
            Self::Done => f.write_str("Done"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// Makes sure a charge callback runs exactly once.
struct ChargeGuard<T, C: FnOnce(Charge<T>)> {
    callback: Option<C>,
    _item: PhantomData<fn(T)>,
}

impl<T, C: FnOnce(Charge<T>)> ChargeGuard<T, C> {
    fn fire(&mut self, charge: Charge<T>) {
        if let Some(callback) = self.callback.take() {
            callback(charge);
        }
    }
}

impl<T, C: FnOnce(Charge<T>)> Drop for ChargeGuard<T, C> {
    fn drop(&mut self) {
        if self.callback.is_some() {
            tracing::debug!("charged generator torn down before producing");
            self.fire(Charge::Failed(Error::Canceled));
        }
    }
}

/// Blocking iterator over a borrowed generator.
pub struct Iter<'a, T> {
    generator: &'a mut Generator<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        self.generator.next_blocking().transpose()
    }
}

/// Blocking iterator over an owned generator.
pub struct IntoIter<T> {
    generator: Generator<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        self.generator.next_blocking().transpose()
    }
}

impl<T> IntoIterator for Generator<T> {
    type Item = Result<T>;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { generator: self }
    }
}

impl<'a, T> IntoIterator for &'a mut Generator<T> {
    type Item = Result<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
