//! Per-thread pooled free lists sliced by size class.
//!
//! Requests are rounded up to a multiple of
//! [`POOL_STEP_BYTES`](crate::config::POOL_STEP_BYTES); requests larger than
//! [`POOL_MAX_FRAME`](crate::config::POOL_MAX_FRAME) or more aligned than
//! [`FRAME_ALIGN`] go straight to the host allocator.
//!
//! Each thread keeps an intrusive free list per class. When a local list is
//! empty the thread grabs the whole batch parked in the global slot of that
//! class, if any. When a local list grows past its cap on free, the thread
//! tries to park the whole list in the global slot with a single
//! compare-exchange, which only succeeds if the slot is empty; otherwise the
//! block goes back to the host allocator. Allocation and release are
//! amortized O(1) and touch shared memory only on a local miss.

use super::FRAME_ALIGN;
use crate::config::{POOL_LEVELS, POOL_MAX_CACHE_BYTES, POOL_MAX_FRAME, POOL_STEP_BYTES};
use crate::error::{Error, Result};

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// Header written into every free block.
///
/// `len` is only meaningful on the first block of a list.
struct FreeBlock {
    next: *mut FreeBlock,
    len: usize,
}

const _: () = assert!(POOL_STEP_BYTES >= size_of::<FreeBlock>());
const _: () = assert!(FRAME_ALIGN >= align_of::<FreeBlock>());

/// One parked batch per size class.
static GLOBAL: [AtomicPtr<FreeBlock>; POOL_LEVELS] =
    [const { AtomicPtr::new(ptr::null_mut()) }; POOL_LEVELS];

struct LocalCache {
    heads: [*mut FreeBlock; POOL_LEVELS],
    counts: [usize; POOL_LEVELS],
}

thread_local! {
    static LOCAL: RefCell<LocalCache> = const {
        RefCell::new(LocalCache {
            heads: [ptr::null_mut(); POOL_LEVELS],
            counts: [0; POOL_LEVELS],
        })
    };

    /// Blocks allocated minus blocks released by this thread.
    static BALANCE: Cell<isize> = const { Cell::new(0) };
}

/// Returns the size class serving `layout`, or `None` for the host path.
pub fn class_of(layout: Layout) -> Option<usize> {
    if layout.align() > FRAME_ALIGN || layout.size() > POOL_MAX_FRAME {
        return None;
    }

    Some(layout.size().saturating_sub(1) / POOL_STEP_BYTES)
}

/// Size in bytes of the blocks of `class`.
pub fn block_size(class: usize) -> usize {
    (class + 1) * POOL_STEP_BYTES
}

/// Maximum number of blocks a thread caches for `class`.
pub fn cache_cap(class: usize) -> usize {
    (POOL_MAX_CACHE_BYTES / block_size(class)).max(1)
}

fn block_layout(class: usize) -> Layout {
    // Safety: the alignment is a power of two and class sizes are small
    // multiples of the step, far below `isize::MAX`.
    unsafe { Layout::from_size_align_unchecked(block_size(class), FRAME_ALIGN) }
}

/// Allocates memory for `layout`.
///
/// The returned block is at least `layout.size()` bytes and aligned to
/// `max(layout.align(), FRAME_ALIGN)` when served by the pool.
pub fn allocate(layout: Layout) -> Result<NonNull<u8>> {
    let Some(class) = class_of(layout) else {
        return host_alloc(layout);
    };

    let cached = LOCAL
        .try_with(|local| local.borrow_mut().pop(class))
        .ok()
        .flatten();

    let block = match cached {
        Some(block) => block,
        None => host_alloc(block_layout(class))?,
    };

    let _ = BALANCE.try_with(|b| b.set(b.get() + 1));
    tracing::trace!(size = layout.size(), class, "frame block allocated");

    Ok(block)
}

/// Releases memory obtained from [`allocate`] with the same `layout`.
///
/// # Safety
///
/// `block` must come from [`allocate`] called with an identical `layout`
/// and must not be used afterwards.
pub unsafe fn deallocate(block: NonNull<u8>, layout: Layout) {
    let Some(class) = class_of(layout) else {
        // Safety: host path, same layout as the allocation.
        unsafe { alloc::dealloc(block.as_ptr(), layout) };
        return;
    };

    let _ = BALANCE.try_with(|b| b.set(b.get() - 1));

    let kept = LOCAL
        .try_with(|local| local.borrow_mut().push(class, block))
        .unwrap_or(false);

    if !kept {
        let block: *mut FreeBlock = block.as_ptr().cast();

        // Safety: the block is unused, large enough for a header and was
        // allocated with the class layout. It becomes a list of one.
        unsafe {
            block.write(FreeBlock {
                next: ptr::null_mut(),
                len: 1,
            });
            park_or_free(class, block, 1);
        }
    }
}

/// Number of blocks the current thread caches for `class`.
pub fn cached_blocks(class: usize) -> usize {
    LOCAL
        .try_with(|local| local.borrow().counts.get(class).copied().unwrap_or(0))
        .unwrap_or(0)
}

/// Pooled blocks allocated minus blocks released on the current thread.
pub fn thread_balance() -> isize {
    BALANCE.try_with(Cell::get).unwrap_or(0)
}

fn host_alloc(layout: Layout) -> Result<NonNull<u8>> {
    if layout.size() == 0 {
        return Err(Error::Allocation {
            size: 0,
            reason: "zero-sized frame",
        });
    }

    // Safety: the layout has a non-zero size.
    let raw = unsafe { alloc::alloc(layout) };

    NonNull::new(raw).ok_or(Error::Allocation {
        size: layout.size(),
        reason: "host allocator returned null",
    })
}

/// Parks a list in the global slot of `class` if it is empty, otherwise
/// returns every block of the list to the host allocator.
///
/// # Safety
///
/// `head` must be a valid list of `len` unused blocks of `class`.
unsafe fn park_or_free(class: usize, head: *mut FreeBlock, len: usize) {
    // Safety: the caller hands over a valid list head.
    unsafe { (*head).len = len };

    let parked = GLOBAL[class]
        .compare_exchange(ptr::null_mut(), head, Ordering::Release, Ordering::Relaxed)
        .is_ok();

    if parked {
        return;
    }

    let layout = block_layout(class);
    let mut cursor = head;

    while !cursor.is_null() {
        // Safety: every block of the list is valid and unused.
        let next = unsafe { (*cursor).next };
        unsafe { alloc::dealloc(cursor.cast(), layout) };
        cursor = next;
    }
}

impl LocalCache {
    fn pop(&mut self, class: usize) -> Option<NonNull<u8>> {
        if self.heads[class].is_null() {
            let batch = GLOBAL[class].swap(ptr::null_mut(), Ordering::Acquire);

            if batch.is_null() {
                return None;
            }

            self.heads[class] = batch;
            // Safety: parked batches carry their length in the head block.
            self.counts[class] = unsafe { (*batch).len };
        }

        let head = self.heads[class];
        // Safety: non-null heads point to unused blocks owned by this cache.
        self.heads[class] = unsafe { (*head).next };
        self.counts[class] -= 1;

        NonNull::new(head.cast())
    }

    /// Returns `false` if the block must be disposed of by the caller.
    fn push(&mut self, class: usize, block: NonNull<u8>) -> bool {
        if self.counts[class] >= cache_cap(class) {
            let head = std::mem::replace(&mut self.heads[class], ptr::null_mut());
            let len = std::mem::replace(&mut self.counts[class], 0);

            // Safety: the local list is valid and exclusively owned.
            unsafe { (*head).len = len };

            if GLOBAL[class]
                .compare_exchange(ptr::null_mut(), head, Ordering::Release, Ordering::Relaxed)
                .is_err()
            {
                // Global slot busy: keep the local list and free this block.
                self.heads[class] = head;
                self.counts[class] = len;
                return false;
            }
        }

        let block: *mut FreeBlock = block.as_ptr().cast();
        // Safety: the block is unused and large enough for a header.
        unsafe {
            block.write(FreeBlock {
                next: self.heads[class],
                len: 0,
            })
        };

        self.heads[class] = block;
        self.counts[class] += 1;
        true
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        for class in 0..POOL_LEVELS {
            let head = self.heads[class];

            if !head.is_null() {
                // Safety: the thread is exiting and owns the list.
                unsafe { park_or_free(class, head, self.counts[class]) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_map_to_step_classes() {
        let step = POOL_STEP_BYTES;

        assert_eq!(class_of(Layout::from_size_align(1, 8).unwrap()), Some(0));
        assert_eq!(class_of(Layout::from_size_align(step, 8).unwrap()), Some(0));
        assert_eq!(class_of(Layout::from_size_align(step + 1, 8).unwrap()), Some(1));
        assert_eq!(
            class_of(Layout::from_size_align(POOL_MAX_FRAME, 8).unwrap()),
            Some(POOL_LEVELS - 1)
        );
        assert_eq!(class_of(Layout::from_size_align(POOL_MAX_FRAME + 1, 8).unwrap()), None);
        assert_eq!(class_of(Layout::from_size_align(64, 64).unwrap()), None);
    }

    #[test]
    fn freed_blocks_are_reused_locally() {
        let layout = Layout::from_size_align(3 * POOL_STEP_BYTES, 8).unwrap();
        let class = class_of(layout).unwrap();

        let a = allocate(layout).unwrap();
        let before = cached_blocks(class);
        unsafe { deallocate(a, layout) };
        assert_eq!(cached_blocks(class), before + 1);

        let b = allocate(layout).unwrap();
        assert_eq!(a, b);
        unsafe { deallocate(b, layout) };
    }

    #[test]
    fn local_cache_is_capped() {
        let layout = Layout::from_size_align(POOL_MAX_FRAME, 8).unwrap();
        let class = class_of(layout).unwrap();
        let cap = cache_cap(class);

        let blocks: Vec<_> = (0..cap * 3).map(|_| allocate(layout).unwrap()).collect();
        for block in blocks {
            unsafe { deallocate(block, layout) };
        }

        assert!(cached_blocks(class) <= cap);
    }

    #[test]
    fn overflowing_blocks_with_stale_contents_are_released() {
        let layout = Layout::from_size_align(POOL_MAX_FRAME, 8).unwrap();
        let class = class_of(layout).unwrap();
        let cap = cache_cap(class);

        // Occupy the global slot so overflow has to go to the host.
        let parked: Vec<_> = (0..cap + 1).map(|_| allocate(layout).unwrap()).collect();
        let blocks: Vec<_> = (0..cap * 3).map(|_| allocate(layout).unwrap()).collect();

        for block in parked.into_iter().chain(blocks) {
            // Leave a non-null word behind, as a finished frame would.
            unsafe { block.as_ptr().cast::<usize>().write(0xdead_beef) };
            unsafe { deallocate(block, layout) };
        }

        assert!(cached_blocks(class) <= cap);

        let again: Vec<_> = (0..cap * 2).map(|_| allocate(layout).unwrap()).collect();
        for block in again {
            unsafe { deallocate(block, layout) };
        }
    }

    #[test]
    fn host_path_for_large_frames() {
        let layout = Layout::from_size_align(POOL_MAX_FRAME * 2, 8).unwrap();
        let block = allocate(layout).unwrap();
        unsafe { deallocate(block, layout) };
    }

    #[test]
    fn cross_thread_free_is_safe() {
        let layout = Layout::from_size_align(2 * POOL_STEP_BYTES, 8).unwrap();
        let blocks: Vec<usize> = (0..64)
            .map(|_| allocate(layout).unwrap().as_ptr() as usize)
            .collect();

        std::thread::spawn(move || {
            for addr in blocks {
                let block = NonNull::new(addr as *mut u8).unwrap();
                unsafe { deallocate(block, layout) };
            }
        })
        .join()
        .unwrap();
    }
}
