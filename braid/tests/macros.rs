use braid::future::pair;
use braid::join;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[braid::test]
async fn test_join_single_future() {
    let a = join!(async { 42 });
    assert_eq!(a, 42);
}

#[braid::test]
async fn test_join_different_types() {
    let (num, text, v) = join!(async { 100i32 }, async { String::from("test") }, async {
        vec![1, 2, 3]
    });

    assert_eq!(num, 100);
    assert_eq!(text, "test");
    assert_eq!(v, vec![1, 2, 3]);
}

#[braid::test]
async fn test_join_with_trailing_comma() {
    let (a, b) = join!(async { 1 }, async { 2 },);
    assert_eq!(a + b, 3);
}

#[braid::test]
async fn test_join_runs_concurrently() {
    let (first, second) = (pair::<u32>(), pair::<u32>());
    let (promise_a, deferred_a) = first;
    let (promise_b, deferred_b) = second;

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        promise_b.set_value(2);
        promise_a.set_value(1);
    });

    let (a, b) = join!(deferred_a, deferred_b);
    assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
}

#[braid::test]
async fn test_join_shared_state() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (c1, c2, c3) = (counter.clone(), counter.clone(), counter.clone());

    join!(
        async move {
            c1.fetch_add(1, Ordering::SeqCst);
        },
        async move {
            c2.fetch_add(10, Ordering::SeqCst);
        },
        async move {
            c3.fetch_add(100, Ordering::SeqCst);
        }
    );

    assert_eq!(counter.load(Ordering::SeqCst), 111);
}

#[braid::test]
async fn test_join_spawned_tasks() {
    let a = braid::spawn(async { 3 });
    let b = braid::spawn(async { 4 });

    let (a, b) = join!(a, b);
    assert_eq!(a.unwrap() * b.unwrap(), 12);
}

#[test]
fn test_block_on_plain_value() {
    assert_eq!(braid::block_on(async { "plain" }), "plain");
}

#[braid::test]
async fn test_join_keeps_operators_and_casts_intact() {
    let base = 5i32;

    let (cast, negated, text) = join!(
        async { 300u32 as u8 },
        async move { base - -1 },
        std::future::ready::<&'static str>("ok")
    );

    assert_eq!(cast, 44);
    assert_eq!(negated, 6);
    assert_eq!(text, "ok");
}
