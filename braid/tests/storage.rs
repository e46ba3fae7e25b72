use braid::alloc::{
    BufferStorage, Frame, PlacementStorage, ReusableStorage, SharedReusableStorage,
    StaticStorage, pool,
};
use braid::{Error, Subtask};

use std::alloc::Layout;
use std::mem::MaybeUninit;

async fn sum(values: [u64; 8]) -> u64 {
    values.iter().sum()
}

#[test]
fn test_subtask_in_static_storage() {
    let storage = StaticStorage::<1024>::new();

    let subtask = Subtask::new_in(&storage, sum([1; 8])).unwrap();
    assert_eq!(subtask.join().unwrap(), 8);

    // The buffer is released with the frame and can serve again.
    let again = Subtask::new_in(&storage, sum([2; 8])).unwrap();
    assert_eq!(again.join().unwrap(), 16);
}

#[test]
fn test_static_storage_too_small() {
    let storage = StaticStorage::<16>::new();

    match Subtask::new_in(&storage, sum([0; 8])) {
        Err(Error::Allocation { size, .. }) => assert!(size > StaticStorage::<16>::capacity()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_static_storage_serves_one_frame_at_a_time() {
    let storage = StaticStorage::<1024>::new();

    let first = Frame::new_in(&storage, sum([0; 8])).unwrap();
    assert!(first.is_in_storage());
    assert!(matches!(
        Frame::new_in(&storage, sum([0; 8])),
        Err(Error::Allocation { .. })
    ));

    drop(first);
    assert!(Frame::new_in(&storage, sum([0; 8])).is_ok());
}

#[test]
fn test_reusable_storage_grows_and_is_reused() {
    let storage = ReusableStorage::new();
    assert_eq!(storage.capacity(), 0);

    let small = Frame::new_in(&storage, async { 1u8 }).unwrap();
    let small_size = small.size();
    drop(small);
    assert!(storage.capacity() >= small_size);

    let large = Frame::new_in(&storage, sum([3; 8])).unwrap();
    let large_size = large.size();
    assert!(large.is_in_storage());
    drop(large);

    let grown = storage.capacity();
    assert!(grown >= large_size);

    let small = Frame::new_in(&storage, async { 2u8 }).unwrap();
    drop(small);
    assert_eq!(storage.capacity(), grown);
}

#[test]
fn test_shared_storage_falls_back_when_busy() {
    let storage = SharedReusableStorage::new();

    let first = Frame::new_in(&storage, sum([0; 8])).unwrap();
    assert!(storage.is_busy());
    assert!(first.is_in_storage());

    let second = Frame::new_in(&storage, sum([0; 8])).unwrap();
    assert!(!second.is_in_storage());

    drop(first);
    assert!(!storage.is_busy());
    drop(second);
}

#[test]
fn test_placement_storage() {
    let mut buffer = [MaybeUninit::<u8>::uninit(); 512];
    let storage = PlacementStorage::new(&mut buffer);

    let subtask = Subtask::new_in(&storage, sum([5; 8])).unwrap();
    assert_eq!(subtask.join().unwrap(), 40);
}

#[test]
fn test_placement_storage_too_small() {
    let mut buffer = [MaybeUninit::<u8>::uninit(); 8];
    let storage = PlacementStorage::new(&mut buffer);

    assert!(matches!(
        Subtask::new_in(&storage, sum([0; 8])),
        Err(Error::Allocation { .. })
    ));
}

#[test]
fn test_buffer_storage_reuses_vec() {
    let mut backing: Vec<u64> = vec![7; 4];

    {
        let storage = BufferStorage::new(&mut backing);
        let subtask = Subtask::new_in(&storage, sum([1; 8])).unwrap();
        assert_eq!(subtask.join().unwrap(), 8);
    }

    assert!(backing.is_empty());
    assert!(backing.capacity() > 4);
}

#[test]
fn test_buffer_storage_of_zero_sized_elements_falls_back() {
    let mut backing: Vec<()> = Vec::new();
    let storage = BufferStorage::new(&mut backing);
    let payload = [3u64; 8];

    let frame = Frame::new_in(&storage, async move { payload.iter().sum::<u64>() }).unwrap();
    assert!(!frame.is_in_storage());
    drop(frame);

    let subtask = Subtask::new_in(&storage, sum(payload)).unwrap();
    assert_eq!(subtask.join().unwrap(), 24);
}

#[test]
fn test_frame_output_may_borrow_from_the_caller() {
    let words = vec![String::from("borrowed"), String::from("output")];
    let storage = ReusableStorage::new();

    let subtask = Subtask::new_in(&storage, async {
        words.iter().map(String::as_str).collect::<Vec<&str>>()
    })
    .unwrap();

    assert_eq!(subtask.join().unwrap(), ["borrowed", "output"]);
}

#[test]
fn test_pool_balance_returns_to_zero() {
    let before = pool::thread_balance();

    let frames: Vec<_> = (0..10)
        .map(|i| Frame::new(async move { i }).unwrap())
        .collect();
    assert_eq!(pool::thread_balance(), before + 10);

    drop(frames);
    assert_eq!(pool::thread_balance(), before);
}

#[test]
fn test_pool_caches_released_blocks() {
    let layout = Layout::from_size_align(100, 8).unwrap();
    let class = pool::class_of(layout).unwrap();
    assert!(pool::block_size(class) >= 100);

    let block = pool::allocate(layout).unwrap();
    let cached = pool::cached_blocks(class);

    // Safety: allocated above with the same layout.
    unsafe { pool::deallocate(block, layout) };
    assert_eq!(pool::cached_blocks(class), cached + 1);

    let again = pool::allocate(layout).unwrap();
    assert_eq!(again, block);
    assert_eq!(pool::cached_blocks(class), cached);

    // Safety: allocated above with the same layout.
    unsafe { pool::deallocate(again, layout) };
}

#[test]
fn test_oversized_frames_bypass_the_pool() {
    let layout = Layout::from_size_align(1 << 20, 8).unwrap();
    assert!(pool::class_of(layout).is_none());

    let block = pool::allocate(layout).unwrap();
    // Safety: allocated above with the same layout.
    unsafe { pool::deallocate(block, layout) };
}

#[test]
fn test_pool_overflow_from_many_threads() {
    let layout = Layout::from_size_align(braid::config::POOL_MAX_FRAME, 8).unwrap();
    let class = pool::class_of(layout).unwrap();
    let count = pool::cache_cap(class) * 4;

    let threads: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(move || {
                for _ in 0..3 {
                    let blocks: Vec<_> = (0..count)
                        .map(|_| pool::allocate(layout).unwrap())
                        .collect();

                    for block in blocks {
                        // Safety: the block holds at least `layout.size()` bytes.
                        unsafe { block.as_ptr().write_bytes(0xa5, layout.size()) };
                        // Safety: allocated above with the same layout.
                        unsafe { pool::deallocate(block, layout) };
                    }

                    assert!(pool::cached_blocks(class) <= pool::cache_cap(class));
                }

                assert_eq!(pool::thread_balance(), 0);
            })
        })
        .collect();

    for thread in threads {
        thread.join().unwrap();
    }
}
