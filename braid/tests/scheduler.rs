use braid::future::pair;
use braid::runtime::ThreadPool;
use braid::time::{Ident, Scheduler};
use braid::{Error, block_on};

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_sleep_waits_for_deadline() {
    let scheduler = Scheduler::new();
    assert!(scheduler.start());
    assert!(!scheduler.start());

    let started = Instant::now();
    scheduler
        .sleep_for(Duration::from_millis(20), Ident::NONE)
        .wait()
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_entries_fire_in_deadline_order() {
    let scheduler = Scheduler::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let now = Instant::now();

    let sleeps: Vec<_> = [30u64, 10, 20]
        .into_iter()
        .map(|ms| {
            let order = order.clone();
            let sleep = scheduler.sleep_until(now + Duration::from_millis(ms), Ident::NONE);

            braid::spawn(async move {
                sleep.await.unwrap();
                order.lock().unwrap().push(ms);
            })
        })
        .collect();

    scheduler.start();

    for sleep in sleeps {
        sleep.join().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), [10, 20, 30]);
}

#[test]
fn test_cancel_with_custom_error() {
    let scheduler = Scheduler::new();
    let ident = Ident::unique();

    let sleep = scheduler.sleep_for(Duration::from_secs(60), ident);
    assert_eq!(scheduler.pending(), 1);

    assert!(scheduler.cancel_with(ident, Error::NotReady));
    assert!(!scheduler.cancel(ident));

    assert!(matches!(sleep.wait(), Err(Error::NotReady)));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_cancel_removes_earliest_match() {
    let scheduler = Scheduler::new();
    let ident = Ident::unique();
    let now = Instant::now();

    let late = scheduler.sleep_until(now + Duration::from_secs(120), ident);
    let early = scheduler.sleep_until(now + Duration::from_secs(60), ident);

    assert!(scheduler.cancel(ident));

    assert!(matches!(early.wait(), Err(Error::Canceled)));
    assert!(!late.is_ready());
    assert_eq!(scheduler.pending(), 1);
}

#[test]
fn test_drop_cancels_pending_entries() {
    let scheduler = Scheduler::new();
    scheduler.start();

    let sleep = scheduler.sleep_for(Duration::from_secs(60), Ident::NONE);
    drop(scheduler);

    assert!(matches!(sleep.wait(), Err(Error::Canceled)));
}

#[test]
fn test_schedule_explicit_promise() {
    let scheduler = Scheduler::new();
    scheduler.start();

    let (promise, deferred) = pair();
    scheduler.schedule(Ident::NONE, promise, Instant::now());

    assert!(deferred.wait().is_ok());
}

#[test]
fn test_run_until_in_foreground() {
    let scheduler = Scheduler::new();
    let sleep = scheduler.sleep_for(Duration::from_millis(10), Ident::NONE);

    let started = Instant::now();
    let output = scheduler.run_until(sleep).unwrap();

    assert!(output.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(10));
}

#[test]
fn test_run_until_stops_on_external_completion() {
    let scheduler = Scheduler::new();
    let (promise, deferred) = pair::<u8>();

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        promise.set_value(4);
    });

    assert_eq!(scheduler.run_until(deferred).unwrap().unwrap(), 4);
}

#[test]
fn test_run_in_pool_completes_on_workers() {
    let pool = ThreadPool::new(2);
    let scheduler = Scheduler::new();
    scheduler.run_in(&pool);

    let sleep = scheduler.sleep_for(Duration::from_millis(5), Ident::NONE);
    let task = braid::spawn(async move {
        sleep.await.unwrap();
        thread::current().name().map(str::to_owned)
    });

    let name = task.join().unwrap();
    assert!(name.is_some_and(|n| n.starts_with("braid-worker")));

    drop(scheduler);
}

#[test]
fn test_interval_ticks_are_aligned() {
    let scheduler = Scheduler::new();
    scheduler.start();

    let period = Duration::from_millis(10);
    let started = Instant::now();
    let mut ticks = scheduler.interval(period);

    let first = ticks.next_blocking().unwrap().unwrap();

    // A slow consumer does not push later ticks back.
    thread::sleep(Duration::from_millis(35));

    let rest: Vec<Instant> = (0..3)
        .map(|_| ticks.next_blocking().unwrap().unwrap())
        .collect();

    assert!(first >= started + period);
    for (k, tick) in rest.iter().enumerate() {
        assert_eq!(*tick - first, period * (k as u32 + 1));
    }
}

#[test]
fn test_sleep_inside_task() {
    let scheduler = Arc::new(Scheduler::new());
    scheduler.start();

    let timer = scheduler.clone();
    let result = block_on(async move {
        timer
            .sleep_for(Duration::from_millis(5), Ident::NONE)
            .await
            .map(|()| "woke")
    });

    assert_eq!(result.unwrap(), "woke");
}
