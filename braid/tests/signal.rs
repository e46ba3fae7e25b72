use braid::sync::{Listener, Signal};
use braid::{Error, block_on};

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;

fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    Pin::new(future).poll(&mut cx)
}

#[test]
fn test_emit_without_listeners() {
    let signal = Signal::new();
    assert_eq!(signal.emit(1), 0);
    assert_eq!(signal.listener_count(), 0);
}

#[test]
fn test_listener_misses_earlier_publications() {
    let signal = Signal::new();
    let mut listener = signal.listen();

    signal.emit("early");

    assert!(poll_once(&mut listener.recv()).is_pending());
    signal.emit("late");
    assert!(matches!(poll_once(&mut listener.recv()), Poll::Ready(Ok("late"))));
}

#[test]
fn test_blocking_listener_across_threads() {
    let signal = Signal::new();
    let mut listener = signal.listen();

    let waiter = thread::spawn(move || block_on(listener.recv()));

    while signal.listener_count() == 0 {
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(signal.emit(5u8), 1);
    assert!(matches!(waiter.join().unwrap(), Ok(5)));
}

#[test]
fn test_connected_callback_until_false() {
    let signal = Signal::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    assert!(signal.connect(move |value: &u32| {
        sink.lock().unwrap().push(*value);
        *value < 2
    }));

    for value in 0..5 {
        signal.emit(value);
    }

    assert_eq!(*seen.lock().unwrap(), [0, 1, 2]);
    assert_eq!(signal.listener_count(), 0);
}

#[test]
fn test_clone_keeps_signal_alive() {
    let signal = Signal::new();
    let second = signal.clone();
    let mut listener = signal.listen();

    assert!(poll_once(&mut listener.recv()).is_pending());

    drop(signal);
    assert!(poll_once(&mut listener.recv()).is_pending());

    second.emit(3);
    assert!(matches!(poll_once(&mut listener.recv()), Poll::Ready(Ok(3))));

    assert!(poll_once(&mut listener.recv()).is_pending());
    drop(second);
    assert!(matches!(
        poll_once(&mut listener.recv()),
        Poll::Ready(Err(Error::Canceled))
    ));
}

#[test]
fn test_listen_after_teardown() {
    let signal = Signal::<u8>::new();
    let mut listener = signal.listen();
    drop(signal);

    assert!(matches!(
        poll_once(&mut listener.recv()),
        Poll::Ready(Err(Error::Canceled))
    ));
}

#[test]
fn test_dormant_listener_binds_on_first_wait() {
    let stash = Arc::new(Mutex::new(None));
    let slot = stash.clone();

    let mut listener = Listener::dormant(move |signal: Signal<u32>| {
        *slot.lock().unwrap() = Some(signal);
    });

    assert!(!listener.is_bound());
    assert!(stash.lock().unwrap().is_none());

    assert!(poll_once(&mut listener.recv()).is_pending());
    assert!(listener.is_bound());

    let signal = stash.lock().unwrap().take().unwrap();
    assert_eq!(signal.emit(9), 1);
    assert!(matches!(poll_once(&mut listener.recv()), Poll::Ready(Ok(9))));
}

#[test]
fn test_dormant_register_may_emit_immediately() {
    let mut listener = Listener::dormant(|signal: Signal<&'static str>| {
        signal.emit("ready");
    });

    assert_eq!(block_on(listener.recv()).unwrap(), "ready");
}

#[test]
fn test_dropped_listener_stops_counting() {
    let signal = Signal::new();
    let mut kept = signal.listen();
    let mut dropped = signal.listen();

    assert!(poll_once(&mut kept.recv()).is_pending());
    assert!(poll_once(&mut dropped.recv()).is_pending());
    assert_eq!(signal.listener_count(), 2);

    drop(dropped);
    assert_eq!(signal.listener_count(), 1);

    assert_eq!(signal.emit(4), 1);
    assert!(matches!(poll_once(&mut kept.recv()), Poll::Ready(Ok(4))));
    assert_eq!(signal.listener_count(), 0);
}
