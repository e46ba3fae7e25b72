use super::Policy;
use crate::awaiter::Handle;

/// Resumes handles directly on the caller's stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Policy for Inline {
    fn resume(&self, handle: Handle) {
        handle.resume();
    }

    fn resume_handle(&self, handle: Handle) -> Option<Handle> {
        Some(handle)
    }
}
