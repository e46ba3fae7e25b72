use super::Policy;
use crate::awaiter::Handle;
use crate::error::Error;

use std::thread;

/// Resumes every handle on a fresh detached thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallel;

impl Policy for Parallel {
    fn resume(&self, handle: Handle) {
        let spare = handle.clone();

        let spawned = thread::Builder::new()
            .name("braid-parallel".into())
            .spawn(move || handle.resume());

        if let Err(error) = spawned {
            tracing::error!(%error, "failed to spawn a parallel resumption thread");
            spare.fail(Error::Canceled);
        }
    }
}
