use crate::error::Error;

use std::sync::Arc;

/// A suspended computation that can be resumed by a policy.
///
/// A handle is the unit every [`Policy`](crate::policy::Policy) moves around:
/// resuming it runs the computation until its next suspension point.
pub trait Resumable: Send + Sync {
    /// Runs the computation until it suspends again or completes.
    fn resume(self: Arc<Self>);

    /// Reports that the resumption could not be delivered.
    ///
    /// Called by policies that lost their execution target, for example a
    /// dispatcher whose thread has ended. The default drops the handle.
    fn fail(self: Arc<Self>, error: Error) {
        tracing::debug!(%error, "dropping a handle that could not be resumed");
    }
}

/// Shared handle to a resumable computation.
pub type Handle = Arc<dyn Resumable>;
