use super::Policy;
use crate::awaiter::Handle;
use crate::error::Error;
use crate::runtime::Dispatcher;
use crate::runtime::dispatcher::WeakDispatcher;

/// Pins every resumption to the dispatcher of a specific thread.
///
/// If that thread has ended by the time a resumption arrives, the handle is
/// failed with [`Error::HomeThreadEnded`]; it is never moved to another
/// thread.
#[derive(Debug, Clone)]
pub struct DispatcherPolicy {
    home: WeakDispatcher,
}

impl DispatcherPolicy {
    /// Binds the policy to `dispatcher`.
    pub fn new(dispatcher: &Dispatcher) -> Self {
        Self {
            home: dispatcher.downgrade(),
        }
    }

    /// Binds the policy to the dispatcher installed on the current thread.
    pub fn current() -> Option<Self> {
        Dispatcher::current().map(|d| Self::new(&d))
    }
}

impl Policy for DispatcherPolicy {
    fn resume(&self, handle: Handle) {
        match self.home.upgrade() {
            Some(dispatcher) => dispatcher.post(handle),
            None => handle.fail(Error::HomeThreadEnded),
        }
    }

    fn can_block(&self) -> bool {
        !self.home.is_current_thread()
    }
}
