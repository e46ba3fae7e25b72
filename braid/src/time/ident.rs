use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT: AtomicUsize = AtomicUsize::new(1);

/// Opaque token naming scheduler entries for cancellation.
///
/// Tokens need not be unique; cancellation removes the earliest matching
/// entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ident(usize);

impl Ident {
    /// The token used by entries nobody intends to cancel.
    pub const NONE: Ident = Ident(0);

    /// A token distinct from every other token made by this function.
    pub fn unique() -> Self {
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// A token derived from the address of `value`.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self((value as *const T).cast::<()>() as usize)
    }

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ident({:#x})", self.0)
    }
}
