use super::{Initialize, Policy, Start};
use crate::awaiter::Handle;
use crate::runtime::ThreadPool;

use std::sync::OnceLock;

/// Resumes handles on a [`ThreadPool`].
///
/// The pool can be supplied at construction or later through
/// [`Initialize::initialize_policy`]. A computation created before a pool is
/// known stays suspended until one is provided.
#[derive(Debug, Default)]
pub struct PoolPolicy {
    pool: OnceLock<ThreadPool>,
}

impl PoolPolicy {
    /// Creates a policy bound to `pool`.
    pub fn new(pool: ThreadPool) -> Self {
        Self {
            pool: OnceLock::from(pool),
        }
    }

    /// Creates a policy with no pool yet.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Returns the pool, if one was supplied.
    pub fn pool(&self) -> Option<&ThreadPool> {
        self.pool.get()
    }
}

impl Policy for PoolPolicy {
    fn initial(&self) -> Start {
        if self.pool.get().is_some() {
            Start::Immediate
        } else {
            Start::Suspended
        }
    }

    fn resume(&self, handle: Handle) {
        match self.pool.get() {
            Some(pool) => pool.enqueue(handle),
            None => match ThreadPool::current() {
                Some(pool) => pool.enqueue(handle),
                None => {
                    tracing::warn!("pool policy resumed before a pool was supplied; running inline");
                    handle.resume();
                }
            },
        }
    }

    fn can_block(&self) -> bool {
        match self.pool.get() {
            Some(pool) => !pool.is_current(),
            None => true,
        }
    }
}

impl Initialize<ThreadPool> for PoolPolicy {
    fn initialize_policy(&self, pool: ThreadPool) -> bool {
        self.pool.set(pool).is_ok()
    }
}
