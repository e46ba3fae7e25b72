use super::{Storage, pool};
use crate::error::{Error, Result};

use std::alloc::Layout;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::ptr::NonNull;
use std::task::{Context, Poll};

/// Where a frame's memory came from. Lives just past the future.
#[derive(Clone, Copy)]
enum Origin<'s> {
    Pool,
    Storage(&'s dyn Storage),
}

/// Polls the future stored at `ptr`.
///
/// # Safety
///
/// `ptr` must point to a live `F` that is never moved.
unsafe fn poll_raw<F: Future>(ptr: NonNull<u8>, cx: &mut Context<'_>) -> Poll<F::Output> {
    // Safety: frames are never moved once written.
    let future = unsafe { Pin::new_unchecked(&mut *ptr.cast::<F>().as_ptr()) };
    future.poll(cx)
}

/// # Safety
///
/// `ptr` must point to a live `F`; it is dead afterwards.
unsafe fn drop_raw<F>(ptr: NonNull<u8>) {
    unsafe { ptr.cast::<F>().drop_in_place() };
}

/// A pinned, heap-placed future with its output type as the only visible
/// parameter.
///
/// The memory comes from the frame [`pool`] or from a [`Storage`] borrowed
/// for `'s`. Dropping the frame drops the future and returns the memory to
/// its origin.
pub struct Frame<'s, T> {
    ptr: NonNull<u8>,
    layout: Layout,
    trailer: usize,
    poll_future: unsafe fn(NonNull<u8>, &mut Context<'_>) -> Poll<T>,
    drop_future: unsafe fn(NonNull<u8>),
    _origin: PhantomData<&'s dyn Storage>,
}

// Safety: `new`/`new_in` require `F: Send`, which is the only state owned.
unsafe impl<T: Send> Send for Frame<'_, T> {}

impl<T> Frame<'static, T> {
    /// Places `future` in a pooled frame.
    pub fn new<F>(future: F) -> Result<Self>
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::place(future, Origin::Pool)
    }
}

impl<'s, T> Frame<'s, T> {
    /// Places `future` in memory provided by `storage`.
    ///
    /// Falls back to the pool when the storage declines.
    pub fn new_in<S, F>(storage: &'s S, future: F) -> Result<Self>
    where
        S: Storage,
        F: Future<Output = T> + Send + 's,
    {
        Self::place(future, Origin::Storage(storage))
    }

    fn place<F>(future: F, origin: Origin<'s>) -> Result<Self>
    where
        F: Future<Output = T> + Send + 's,
    {
        let (layout, trailer) = Layout::new::<F>()
            .extend(Layout::new::<Origin<'s>>())
            .map_err(|_| Error::Allocation {
                size: size_of::<F>(),
                reason: "frame layout overflow",
            })?;
        let layout = layout.pad_to_align();

        let (ptr, origin) = match origin {
            Origin::Pool => (pool::allocate(layout)?, Origin::Pool),
            Origin::Storage(storage) => match storage.alloc(layout)? {
                Some(ptr) => (ptr, origin),
                None => (pool::allocate(layout)?, Origin::Pool),
            },
        };

        // Safety: `ptr` is valid for `layout`, which holds an `F` at offset
        // zero and an `Origin` at `trailer`.
        unsafe {
            ptr.cast::<F>().write(future);
            ptr.add(trailer).cast::<Origin<'s>>().write(origin);
        }

        Ok(Self {
            ptr,
            layout,
            trailer,
            poll_future: poll_raw::<F>,
            drop_future: drop_raw::<F>,
            _origin: PhantomData,
        })
    }

    /// Polls the stored future.
    ///
    /// Must not be called again after it returned `Ready`.
    pub fn poll(&mut self, cx: &mut Context<'_>) -> Poll<T> {
        // Safety: the future is live until `self` is dropped.
        unsafe { (self.poll_future)(self.ptr, cx) }
    }

    /// Returns `true` when the frame lives in caller-supplied storage.
    pub fn is_in_storage(&self) -> bool {
        matches!(self.origin(), Origin::Storage(_))
    }

    /// Size in bytes of the allocation, trailer included.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    fn origin(&self) -> Origin<'s> {
        // Safety: written by `place` and never modified.
        unsafe { self.ptr.add(self.trailer).cast::<Origin<'s>>().read() }
    }
}

impl<T> Drop for Frame<'_, T> {
    fn drop(&mut self) {
        let origin = self.origin();

        // Safety: the future is live and dropped exactly once; the memory is
        // then returned with the layout it was obtained with.
        unsafe {
            (self.drop_future)(self.ptr);

            match origin {
                Origin::Pool => pool::deallocate(self.ptr, self.layout),
                Origin::Storage(storage) => storage.dealloc(self.ptr, self.layout),
            }
        }
    }
}

impl<T> fmt::Debug for Frame<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.layout.size())
            .field("in_storage", &self.is_in_storage())
            .finish()
    }
}
