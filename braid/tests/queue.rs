use braid::sync::{BoundedQueue, Queue};
use braid::{Error, block_on};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::thread;

fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    Pin::new(future).poll(&mut cx)
}

#[test]
fn test_fifo_order() {
    let queue = Queue::new();

    for i in 0..5 {
        queue.push(i).unwrap();
    }

    assert_eq!(queue.len(), 5);

    for i in 0..5 {
        assert_eq!(block_on(queue.pop()).unwrap(), i);
    }

    assert!(queue.try_pop().is_none());
}

#[test]
fn test_push_hands_item_to_oldest_waiter() {
    let queue = Queue::new();
    let mut first = queue.pop();
    let mut second = queue.pop();

    assert!(poll_once(&mut first).is_pending());
    assert!(poll_once(&mut second).is_pending());

    queue.push("a").unwrap();

    // The item is reserved for the first waiter.
    assert_eq!(queue.len(), 0);
    assert!(queue.try_pop().is_none());

    assert!(matches!(poll_once(&mut first), Poll::Ready(Ok("a"))));
    assert!(poll_once(&mut second).is_pending());
}

#[test]
fn test_dropped_waiter_passes_item_on() {
    let queue = Queue::new();
    let mut first = queue.pop();
    let mut second = queue.pop();

    assert!(poll_once(&mut first).is_pending());
    assert!(poll_once(&mut second).is_pending());

    queue.push(1).unwrap();
    drop(first);

    assert!(matches!(poll_once(&mut second), Poll::Ready(Ok(1))));
    assert!(queue.is_empty());
}

#[test]
fn test_close_cancels_waiters_but_keeps_items() {
    let queue = Queue::new();
    let mut waiting = queue.pop();
    assert!(poll_once(&mut waiting).is_pending());

    queue.close();
    assert!(queue.is_closed());
    assert!(matches!(poll_once(&mut waiting), Poll::Ready(Err(Error::Canceled))));
    assert_eq!(queue.push(1), Err(1));

    let queue = Queue::new();
    queue.push(7).unwrap();
    queue.close();

    assert_eq!(block_on(queue.pop()).unwrap(), 7);
    assert!(matches!(block_on(queue.pop()), Err(Error::Canceled)));
}

#[test]
fn test_mpmc_delivers_every_item_once() {
    let queue = Queue::new();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                while let Ok(value) = block_on(queue.pop()) {
                    got.push(value);
                }
                got
            })
        })
        .collect();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    queue.push(p * 1000 + i).unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    queue.close();

    let mut consumed: Vec<_> = consumers
        .into_iter()
        .flat_map(|c| c.join().unwrap())
        .collect();
    consumed.sort_unstable();

    let mut expected: Vec<_> = (0..4)
        .flat_map(|p| (0..250).map(move |i| p * 1000 + i))
        .collect();
    expected.sort_unstable();

    assert_eq!(consumed, expected);
}

#[test]
fn test_bounded_try_push_respects_capacity() {
    let queue = BoundedQueue::new(2);
    assert_eq!(queue.capacity(), 2);

    assert!(queue.try_push(1).is_ok());
    assert!(queue.try_push(2).is_ok());
    assert_eq!(queue.try_push(3), Err(3));
    assert!(queue.is_full());

    assert_eq!(queue.try_pop(), Some(1));
    assert!(!queue.is_full());
}

#[test]
fn test_bounded_close_cancels_producers() {
    let queue = BoundedQueue::new(1);
    queue.try_push(1).unwrap();

    let mut push = queue.push(2);
    assert!(poll_once(&mut push).is_pending());

    queue.close();
    assert!(matches!(poll_once(&mut push), Poll::Ready(Err(Error::Canceled))));
    assert_eq!(queue.try_pop(), Some(1));
}

#[test]
fn test_bounded_dropped_producer_releases_slot() {
    let queue = BoundedQueue::new(1);
    queue.try_push(1).unwrap();

    let mut first = queue.push(2);
    let mut second = queue.push(3);
    assert!(poll_once(&mut first).is_pending());
    assert!(poll_once(&mut second).is_pending());

    // Admits `first`; `second` keeps waiting for room.
    assert_eq!(queue.try_pop(), Some(1));
    assert!(poll_once(&mut second).is_pending());

    drop(first);

    assert!(matches!(poll_once(&mut second), Poll::Ready(Ok(()))));
    assert_eq!(queue.try_pop(), Some(3));
}

#[test]
fn test_bounded_waiting_producers_keep_order() {
    let queue = BoundedQueue::new(1);
    queue.try_push(0).unwrap();

    let mut waiting = queue.push(1);
    assert!(poll_once(&mut waiting).is_pending());

    // A later producer cannot overtake the one already waiting.
    assert_eq!(queue.try_push(2), Err(2));
}

#[test]
fn test_bounded_never_exceeds_capacity() {
    let queue = BoundedQueue::new(3);

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    block_on(queue.push(p * 100 + i)).unwrap();
                }
            })
        })
        .collect();

    let mut total = 0;
    while total < 400 {
        assert!(queue.len() <= queue.capacity());
        block_on(queue.pop()).unwrap();
        total += 1;
    }

    for producer in producers {
        producer.join().unwrap();
    }

    assert!(queue.is_empty());
}
