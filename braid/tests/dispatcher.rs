use braid::future::pair;
use braid::policy::DispatcherPolicy;
use braid::runtime::Dispatcher;
use braid::{Error, Task, block_on};

use std::thread;
use std::time::Duration;

#[test]
fn test_resumptions_run_on_home_thread() {
    let guard = Dispatcher::install();
    let home = thread::current().id();

    let (promise, deferred) = pair::<u32>();
    let policy = DispatcherPolicy::new(guard.dispatcher());

    let task = Task::with_policy(policy, async move {
        let value = deferred.await.unwrap();
        (value, thread::current().id())
    });

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        promise.set_value(11);
    });

    let (value, ran_on) = guard.pump(task).unwrap();

    assert_eq!(value, 11);
    assert_eq!(ran_on, home);
}

#[test]
fn test_posted_work_waits_for_pump() {
    let guard = Dispatcher::install();
    let policy = DispatcherPolicy::current().unwrap();

    let task = Task::with_policy(policy, async { 1 });

    // Posted, but nothing runs until the thread pumps.
    assert!(!task.is_ready());
    assert!(guard.dispatcher().run_pending());
    assert!(task.is_ready());
    assert!(!guard.dispatcher().run_pending());
}

#[test]
fn test_block_on_pumps_installed_dispatcher() {
    let guard = Dispatcher::install();
    let task = Task::with_policy(DispatcherPolicy::new(guard.dispatcher()), async { "pumped" });

    assert_eq!(block_on(task).unwrap(), "pumped");
}

#[test]
fn test_resume_after_home_thread_ended() {
    let (promise, deferred) = pair::<u32>();

    let task = thread::spawn(move || {
        let guard = Dispatcher::install();
        let task = Task::with_policy(DispatcherPolicy::new(guard.dispatcher()), async move {
            deferred.await.unwrap()
        });

        // Run the body up to its first suspension, then let the thread end.
        guard.dispatcher().run_pending();
        assert!(!task.is_ready());
        task
    })
    .join()
    .unwrap();

    promise.set_value(1);

    assert!(matches!(task.join(), Err(Error::HomeThreadEnded)));
}

#[test]
fn test_pending_posts_fail_when_uninstalled() {
    let guard = Dispatcher::install();
    let dispatcher = guard.dispatcher().clone();

    let task = Task::with_policy(DispatcherPolicy::new(&dispatcher), async { 2 });
    assert!(dispatcher.is_alive());

    drop(guard);

    assert!(!dispatcher.is_alive());
    assert!(Dispatcher::current().is_none());
    assert!(matches!(task.join(), Err(Error::HomeThreadEnded)));
}

#[test]
fn test_install_is_idempotent() {
    let first = Dispatcher::install();
    let second = Dispatcher::install();

    assert!(first.dispatcher().is_current_thread());
    assert!(second.dispatcher().is_alive());

    let current = Dispatcher::current().unwrap();
    assert!(current.is_current_thread());
}

#[braid::test(dispatcher)]
async fn test_macro_installs_dispatcher() {
    let policy = DispatcherPolicy::current().unwrap();
    let task = Task::with_policy(policy, async { 5 });

    assert_eq!(task.await.unwrap(), 5);
}
