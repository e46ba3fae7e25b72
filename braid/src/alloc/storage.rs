use super::FRAME_ALIGN;
use crate::config::STATIC_STORAGE_PERCENT;
use crate::error::{Error, Result};

use std::alloc::{self, Layout};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

/// Caller-supplied memory for a coroutine frame.
///
/// `alloc` returns:
/// - `Ok(Some(ptr))`: memory of at least `layout.size()` bytes aligned to
///   [`FRAME_ALIGN`],
/// - `Ok(None)`: the storage declines and the frame falls back to the pool,
/// - `Err(_)`: the frame cannot be created.
///
/// Storages serve one frame at a time unless documented otherwise; a second
/// concurrent request is reported as an allocation error.
pub trait Storage: Sync {
    /// Provides memory for a frame of `layout`.
    fn alloc(&self, layout: Layout) -> Result<Option<NonNull<u8>>>;

    /// Releases memory previously returned by [`alloc`](Self::alloc).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `alloc` on this storage with the same `layout`
    /// and must not be used afterwards.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout);
}

fn busy(layout: Layout) -> Error {
    Error::Allocation {
        size: layout.size(),
        reason: "storage is already serving a frame",
    }
}

/// Exclusive-use flag shared by every single-frame storage.
#[derive(Default)]
struct InUse(AtomicBool);

impl InUse {
    fn acquire(&self) -> bool {
        !self.0.swap(true, Ordering::Acquire)
    }

    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[repr(C, align(16))]
struct Aligned<const N: usize>([MaybeUninit<u8>; N]);

const _: () = assert!(align_of::<Aligned<1>>() == FRAME_ALIGN);

/// A fixed inline buffer of `N` bytes.
///
/// The usable size is `N` scaled by
/// [`STATIC_STORAGE_PERCENT`](crate::config::STATIC_STORAGE_PERCENT), capped
/// at `N`. A frame that does not fit is an allocation error.
pub struct StaticStorage<const N: usize> {
    buffer: UnsafeCell<Aligned<N>>,
    in_use: InUse,
}

// Safety: the buffer is only handed out while `in_use` is held.
unsafe impl<const N: usize> Sync for StaticStorage<N> {}

impl<const N: usize> StaticStorage<N> {
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new(Aligned([MaybeUninit::uninit(); N])),
            in_use: InUse(AtomicBool::new(false)),
        }
    }

    /// Usable size in bytes.
    pub const fn capacity() -> usize {
        let scaled = N / 100 * STATIC_STORAGE_PERCENT + N % 100 * STATIC_STORAGE_PERCENT / 100;
        if scaled < N { scaled } else { N }
    }
}

impl<const N: usize> Default for StaticStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Storage for StaticStorage<N> {
    fn alloc(&self, layout: Layout) -> Result<Option<NonNull<u8>>> {
        if layout.size() > Self::capacity() || layout.align() > FRAME_ALIGN {
            return Err(Error::Allocation {
                size: layout.size(),
                reason: "static storage too small",
            });
        }

        if !self.in_use.acquire() {
            return Err(busy(layout));
        }

        Ok(NonNull::new(self.buffer.get().cast()))
    }

    unsafe fn dealloc(&self, _ptr: NonNull<u8>, _layout: Layout) {
        self.in_use.release();
    }
}

/// Heap block that grows to the largest frame ever requested.
struct Grown {
    block: Option<(NonNull<u8>, Layout)>,
}

impl Grown {
    fn fit(&mut self, layout: Layout) -> Result<NonNull<u8>> {
        if let Some((ptr, current)) = self.block {
            if current.size() >= layout.size() {
                return Ok(ptr);
            }

            // Safety: the block was allocated with `current` and is unused.
            unsafe { alloc::dealloc(ptr.as_ptr(), current) };
            self.block = None;
        }

        let grown = Layout::from_size_align(layout.size().max(1), FRAME_ALIGN).map_err(|_| {
            Error::Allocation {
                size: layout.size(),
                reason: "invalid frame layout",
            }
        })?;

        // Safety: the layout has a non-zero size.
        let ptr = NonNull::new(unsafe { alloc::alloc(grown) }).ok_or(Error::Allocation {
            size: layout.size(),
            reason: "host allocator returned null",
        })?;

        self.block = Some((ptr, grown));
        Ok(ptr)
    }

    fn capacity(&self) -> usize {
        self.block.map_or(0, |(_, layout)| layout.size())
    }
}

impl Drop for Grown {
    fn drop(&mut self) {
        if let Some((ptr, layout)) = self.block.take() {
            // Safety: the block is owned and no frame lives in it any more.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}

/// A heap buffer reused across sequential calls.
///
/// It grows to fit the largest frame it has served and keeps that memory
/// until dropped.
#[derive(Default)]
pub struct ReusableStorage {
    grown: UnsafeCell<Grown>,
    in_use: InUse,
}

// Safety: the buffer is only touched while `in_use` is held.
unsafe impl Sync for ReusableStorage {}
unsafe impl Send for ReusableStorage {}

impl Default for Grown {
    fn default() -> Self {
        Self { block: None }
    }
}

impl ReusableStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the buffer currently held.
    pub fn capacity(&self) -> usize {
        if !self.in_use.acquire() {
            return 0;
        }

        // Safety: exclusive access while `in_use` is held.
        let capacity = unsafe { (*self.grown.get()).capacity() };
        self.in_use.release();
        capacity
    }
}

impl ReusableStorage {
    fn alloc_or(
        &self,
        layout: Layout,
        when_busy: fn(Layout) -> Result<Option<NonNull<u8>>>,
    ) -> Result<Option<NonNull<u8>>> {
        if layout.align() > FRAME_ALIGN {
            return Ok(None);
        }

        if !self.in_use.acquire() {
            return when_busy(layout);
        }

        // Safety: exclusive access while `in_use` is held.
        match unsafe { (*self.grown.get()).fit(layout) } {
            Ok(ptr) => Ok(Some(ptr)),
            Err(error) => {
                self.in_use.release();
                Err(error)
            }
        }
    }
}

impl Storage for ReusableStorage {
    fn alloc(&self, layout: Layout) -> Result<Option<NonNull<u8>>> {
        self.alloc_or(layout, |layout| Err(busy(layout)))
    }

    unsafe fn dealloc(&self, _ptr: NonNull<u8>, _layout: Layout) {
        self.in_use.release();
    }
}

/// Thread-safe variant of [`ReusableStorage`].
///
/// While the buffer serves a frame, other requests fall back to the pool
/// instead of failing.
#[derive(Default)]
pub struct SharedReusableStorage {
    inner: ReusableStorage,
}

impl SharedReusableStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a frame occupies the buffer.
    pub fn is_busy(&self) -> bool {
        self.inner.in_use.0.load(Ordering::Acquire)
    }
}

impl Storage for SharedReusableStorage {
    fn alloc(&self, layout: Layout) -> Result<Option<NonNull<u8>>> {
        self.inner.alloc_or(layout, |layout| {
            tracing::trace!(size = layout.size(), "shared storage busy, using the pool");
            Ok(None)
        })
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) {
        // Safety: forwarded contract.
        unsafe { self.inner.dealloc(ptr, layout) };
    }
}

/// Memory pinned by the caller. Never freed by the storage.
pub struct PlacementStorage<'a> {
    base: NonNull<u8>,
    len: usize,
    in_use: InUse,
    _buffer: PhantomData<&'a mut [MaybeUninit<u8>]>,
}

// Safety: the buffer is only handed out while `in_use` is held.
unsafe impl Sync for PlacementStorage<'_> {}

impl<'a> PlacementStorage<'a> {
    /// Uses `buffer` for frames.
    pub fn new(buffer: &'a mut [MaybeUninit<u8>]) -> Self {
        let len = buffer.len();
        let base = NonNull::from(buffer).cast();

        Self {
            base,
            len,
            in_use: InUse::default(),
            _buffer: PhantomData,
        }
    }
}

impl Storage for PlacementStorage<'_> {
    fn alloc(&self, layout: Layout) -> Result<Option<NonNull<u8>>> {
        let offset = self.base.as_ptr().align_offset(FRAME_ALIGN.max(layout.align()));

        if offset.saturating_add(layout.size()) > self.len {
            return Err(Error::Allocation {
                size: layout.size(),
                reason: "placement buffer too small",
            });
        }

        if !self.in_use.acquire() {
            return Err(busy(layout));
        }

        // Safety: `offset + size` is within the borrowed buffer.
        Ok(NonNull::new(unsafe { self.base.as_ptr().add(offset) }))
    }

    unsafe fn dealloc(&self, _ptr: NonNull<u8>, _layout: Layout) {
        self.in_use.release();
    }
}

/// Reuses the backing array of a caller's `Vec<T>`.
///
/// The vector is cleared and its capacity grown as needed; `T` must be
/// `Copy` so that discarding its contents is sound. A vector of zero-sized
/// elements owns no memory, so such a storage always declines and frames
/// fall back to the pool.
pub struct BufferStorage<'a, T: Copy> {
    buffer: UnsafeCell<&'a mut Vec<T>>,
    in_use: InUse,
}

// Safety: the vector is only touched while `in_use` is held.
unsafe impl<T: Copy + Send> Sync for BufferStorage<'_, T> {}

impl<'a, T: Copy> BufferStorage<'a, T> {
    pub fn new(buffer: &'a mut Vec<T>) -> Self {
        Self {
            buffer: UnsafeCell::new(buffer),
            in_use: InUse::default(),
        }
    }
}

impl<T: Copy + Send> Storage for BufferStorage<'_, T> {
    fn alloc(&self, layout: Layout) -> Result<Option<NonNull<u8>>> {
        if size_of::<T>() == 0 {
            return Ok(None);
        }

        if !self.in_use.acquire() {
            return Err(busy(layout));
        }

        // Safety: exclusive access while `in_use` is held.
        let vec = unsafe { &mut **self.buffer.get() };

        let align = FRAME_ALIGN.max(layout.align());
        let needed = (layout.size() + align).div_ceil(size_of::<T>());

        vec.clear();
        vec.reserve(needed);

        let base = vec.as_mut_ptr().cast::<u8>();
        let offset = base.align_offset(align);

        // Safety: capacity covers `offset + size` bytes.
        Ok(NonNull::new(unsafe { base.add(offset) }))
    }

    unsafe fn dealloc(&self, _ptr: NonNull<u8>, _layout: Layout) {
        self.in_use.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn static_storage_rejects_oversized_frames() {
        let storage = StaticStorage::<64>::new();

        assert!(storage.alloc(layout(128)).is_err());

        let ptr = storage.alloc(layout(32)).unwrap().unwrap();
        assert_eq!(ptr.as_ptr() as usize % FRAME_ALIGN, 0);
        assert!(storage.alloc(layout(16)).is_err());
        unsafe { storage.dealloc(ptr, layout(32)) };
        assert!(storage.alloc(layout(16)).unwrap().is_some());
    }

    #[test]
    fn reusable_storage_grows_and_reuses() {
        let storage = ReusableStorage::new();

        let a = storage.alloc(layout(32)).unwrap().unwrap();
        unsafe { storage.dealloc(a, layout(32)) };
        let b = storage.alloc(layout(16)).unwrap().unwrap();
        assert_eq!(a, b);
        unsafe { storage.dealloc(b, layout(16)) };

        let c = storage.alloc(layout(4096)).unwrap().unwrap();
        unsafe { storage.dealloc(c, layout(4096)) };
        assert!(storage.capacity() >= 4096);
    }

    #[test]
    fn shared_storage_falls_back_when_busy() {
        let storage = SharedReusableStorage::new();

        let a = storage.alloc(layout(32)).unwrap();
        assert!(a.is_some());
        assert!(storage.is_busy());
        assert!(storage.alloc(layout(32)).unwrap().is_none());

        unsafe { storage.dealloc(a.unwrap(), layout(32)) };
        assert!(!storage.is_busy());
    }

    #[test]
    fn placement_storage_respects_bounds() {
        let mut raw = [MaybeUninit::<u8>::uninit(); 256];
        let storage = PlacementStorage::new(&mut raw);

        assert!(storage.alloc(layout(512)).is_err());
        let ptr = storage.alloc(layout(64)).unwrap().unwrap();
        assert_eq!(ptr.as_ptr() as usize % FRAME_ALIGN, 0);
        unsafe { storage.dealloc(ptr, layout(64)) };
    }

    #[test]
    fn buffer_storage_reuses_vec_capacity() {
        let mut backing: Vec<u64> = vec![1, 2, 3];
        {
            let storage = BufferStorage::new(&mut backing);
            let ptr = storage.alloc(layout(200)).unwrap().unwrap();
            assert_eq!(ptr.as_ptr() as usize % FRAME_ALIGN, 0);
            unsafe { storage.dealloc(ptr, layout(200)) };
        }

        assert!(backing.is_empty());
        assert!(backing.capacity() * size_of::<u64>() >= 200);
    }
}
