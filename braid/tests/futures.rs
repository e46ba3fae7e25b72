use braid::awaiter::{self, Awaitable, CallbackAwaiter, Subscription};
use braid::future::{Deferred, pair};
use braid::{Error, block_on};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Boom;

impl std::fmt::Display for Boom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("boom")
    }
}

impl std::error::Error for Boom {}

#[test]
fn test_promise_value_from_another_thread() {
    let (promise, deferred) = pair();

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        promise.set_value(String::from("hello"))
    });

    assert_eq!(block_on(deferred).unwrap(), "hello");
    assert!(producer.join().unwrap());
}

#[test]
fn test_promise_error_is_reraised() {
    let (promise, deferred) = pair::<u32>();
    promise.set_error(Error::user(Boom));

    match deferred.wait() {
        Err(Error::User(error)) => assert_eq!(error.to_string(), "boom"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_dropped_promise_cancels() {
    let (promise, deferred) = pair::<u32>();
    drop(promise);

    assert!(deferred.is_ready());
    assert!(matches!(deferred.wait(), Err(Error::Canceled)));
}

#[test]
fn test_promise_sees_dropped_consumer() {
    let (promise, deferred) = pair::<u32>();
    assert!(!promise.is_canceled());

    drop(deferred);
    assert!(promise.is_canceled());
}

#[test]
fn test_deferred_try_get() {
    let (promise, mut deferred) = pair();
    assert!(deferred.try_get().is_none());

    promise.set_value(3);

    assert!(matches!(deferred.try_get(), Some(Ok(3))));
    assert!(matches!(deferred.try_get(), Some(Err(Error::AlreadyAwaited))));
}

#[test]
fn test_ready_and_failed_deferred() {
    assert_eq!(Deferred::ready(5).wait().unwrap(), 5);
    assert!(matches!(
        Deferred::<u8>::failed(Error::NotReady).wait(),
        Err(Error::NotReady)
    ));
}

#[test]
fn test_shared_deferred_many_consumers() {
    let (promise, deferred) = pair();
    let shared = deferred.share();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let view = shared.clone();
            thread::spawn(move || view.wait())
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    promise.set_value(42u64);

    for consumer in consumers {
        assert_eq!(consumer.join().unwrap().unwrap(), 42);
    }

    assert_eq!(block_on(shared.clone()).unwrap(), 42);
    assert!(matches!(shared.try_get(), Some(Ok(42))));
}

#[test]
fn test_shared_deferred_reraises_error_every_time() {
    let (promise, deferred) = pair::<u8>();
    let shared = deferred.share();
    promise.set_error(Error::user(Boom));

    for _ in 0..3 {
        assert!(matches!(shared.wait(), Err(Error::User(_))));
    }
}

#[test]
fn test_callback_awaiter_runs_on_completion() {
    let (promise, deferred) = pair::<u8>();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let callback = CallbackAwaiter::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(deferred.subscribe(callback), Subscription::Attached);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    promise.set_value(1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(deferred.is_ready());
}

#[test]
fn test_subscribe_after_completion_reports_ready() {
    let (promise, deferred) = pair::<u8>();
    promise.set_value(9);

    let callback = CallbackAwaiter::new(|| panic!("must not be resumed"));
    assert_eq!(deferred.subscribe(callback), Subscription::Ready);
    assert_eq!(awaiter::wait(deferred).unwrap(), 9);
}

#[test]
fn test_callback_awaiter_captures_panic() {
    let (promise, deferred) = pair::<u8>();

    let callback = CallbackAwaiter::new(|| panic!("callback failed"));
    deferred.subscribe(callback.clone());
    promise.set_value(0);

    assert!(matches!(callback.take_error(), Some(Error::Panicked(message)) if message == "callback failed"));
}

#[test]
fn test_subscribers_resume_in_reverse_order() {
    let (promise, deferred) = pair::<u8>();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    for id in 0..3 {
        let order = order.clone();
        deferred.subscribe(CallbackAwaiter::new(move || order.lock().unwrap().push(id)));
    }

    promise.set_value(0);
    assert_eq!(*order.lock().unwrap(), [2, 1, 0]);
}
