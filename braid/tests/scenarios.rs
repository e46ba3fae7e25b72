use braid::sync::{BoundedQueue, Queue, Signal};
use braid::time::{Ident, Scheduler};
use braid::{Error, Generator, Lazy, block_on};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::{Duration, Instant};

fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    Pin::new(future).poll(&mut cx)
}

#[test]
fn test_fibonacci_generator() {
    let mut fib = Generator::new(|co| async move {
        let (mut a, mut b) = (1u64, 2u64);

        for _ in 0..20 {
            co.yield_(a).await;
            (a, b) = (b, a + b);
        }

        Ok(())
    });

    let mut values = Vec::new();
    for _ in 0..20 {
        values.push(fib.next_blocking().unwrap().unwrap());
    }

    assert_eq!(
        values,
        [
            1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 610, 987, 1597, 2584, 4181, 6765,
            10946
        ]
    );

    assert_eq!(fib.next_blocking().unwrap(), None);
    assert!(fib.is_finished());
}

#[test]
fn test_queue_dropped_with_waiting_consumer() {
    let queue = Queue::<i32>::new();
    let pop = queue.pop();

    let consumer = braid::spawn(async move { pop.await });
    assert!(!consumer.is_ready());

    drop(queue);

    assert!(matches!(consumer.join(), Ok(Err(Error::Canceled))));
}

#[test]
fn test_scheduler_sleep_canceled() {
    let scheduler = Scheduler::new();
    scheduler.start();

    let ident = Ident::unique();
    let started = Instant::now();
    let sleep = scheduler.sleep_for(Duration::from_secs(10), ident);

    thread::sleep(Duration::from_millis(1));
    assert!(scheduler.cancel(ident));

    assert!(matches!(sleep.wait(), Err(Error::Canceled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_lazy_canceled_before_start() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();

    let lazy = Lazy::new(async move {
        flag.store(true, Ordering::SeqCst);
        7
    });

    assert!(lazy.mark_canceled());
    assert!(matches!(block_on(lazy.clone()), Err(Error::Canceled)));
    assert!(!ran.load(Ordering::SeqCst));
}

#[test]
fn test_signal_broadcast() {
    let signal = Signal::new();
    let mut listeners: Vec<_> = (0..3).map(|_| signal.listen()).collect();

    for listener in &mut listeners {
        assert!(poll_once(&mut listener.recv()).is_pending());
    }
    assert_eq!(signal.listener_count(), 3);

    assert_eq!(signal.emit(10), 3);
    for listener in &mut listeners {
        assert!(matches!(poll_once(&mut listener.recv()), Poll::Ready(Ok(10))));
    }

    for listener in &mut listeners {
        assert!(poll_once(&mut listener.recv()).is_pending());
    }

    assert_eq!(signal.emit(20), 3);
    for listener in &mut listeners {
        assert!(matches!(poll_once(&mut listener.recv()), Poll::Ready(Ok(20))));
    }

    for listener in &mut listeners {
        assert!(poll_once(&mut listener.recv()).is_pending());
    }

    drop(signal);
    for listener in &mut listeners {
        assert!(matches!(
            poll_once(&mut listener.recv()),
            Poll::Ready(Err(Error::Canceled))
        ));
    }
}

#[test]
fn test_bounded_queue_backpressure() {
    let queue = BoundedQueue::new(2);

    assert!(queue.try_push(1).is_ok());
    block_on(queue.push(2)).unwrap();
    assert!(queue.is_full());

    let producer = queue.clone();
    let push = braid::spawn(async move { producer.push(3).await });
    assert!(!push.is_ready());

    assert_eq!(queue.try_pop(), Some(1));

    assert!(push.is_ready());
    assert!(matches!(push.join(), Ok(Ok(()))));

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.try_pop(), Some(2));
    assert_eq!(queue.try_pop(), Some(3));
    assert!(queue.is_empty());
}
