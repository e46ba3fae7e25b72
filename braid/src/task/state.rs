/// Not running and not scheduled; a wake schedules it.
pub(crate) const IDLE: usize = 0;

/// Handed to the policy and waiting to be resumed.
pub(crate) const QUEUED: usize = 1;

/// Being polled. At most one thread observes this state at a time.
pub(crate) const RUNNING: usize = 2;

/// The frame is gone and the result is published.
pub(crate) const COMPLETED: usize = 3;

/// Woken while running; polled again once the current poll returns.
pub(crate) const NOTIFIED: usize = 4;
