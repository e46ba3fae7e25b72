use super::Ident;
use crate::future::Promise;

use std::cmp::Ordering;
use std::time::Instant;

/// A pending completion in the scheduler heap.
pub(crate) struct Entry {
    pub(crate) deadline: Instant,

    /// Insertion order, so that equal deadlines fire first-in first-out.
    pub(crate) seq: u64,

    pub(crate) promise: Promise<()>,
    pub(crate) ident: Ident,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for Entry {
    /// Reversed so that a `BinaryHeap<Entry>` pops the earliest deadline.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
