//! Frame allocation substrate.
//!
//! Every suspendable computation in the crate keeps its state machine in a
//! [`Frame`]. Frames come either from the per-thread size-class [`pool`] or
//! from a caller-supplied [`Storage`]:
//!
//! | Storage | Behaviour |
//! |---|---|
//! | [`StaticStorage`] | fixed inline buffer; a frame that does not fit is an allocation error |
//! | [`ReusableStorage`] | grows to the largest frame seen, reused by sequential calls |
//! | [`SharedReusableStorage`] | like `ReusableStorage`; a concurrent second user falls back to the pool |
//! | [`PlacementStorage`] | caller-provided memory, never freed |
//! | [`BufferStorage`] | reuses the backing array of a `Vec<T: Copy>` |
//!
//! The storage a frame came from is recorded in a trailer placed just past
//! the frame, so deallocation never needs to be told where memory came from.

mod frame;
mod storage;

pub mod pool;

pub use frame::Frame;
pub use storage::{
    BufferStorage, PlacementStorage, ReusableStorage, SharedReusableStorage, StaticStorage,
    Storage,
};

/// Alignment guaranteed by the pool and by every built-in storage.
pub const FRAME_ALIGN: usize = 16;
