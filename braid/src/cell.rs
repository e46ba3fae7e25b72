//! One-shot result slot.
//!
//! [`ValueCell`] is the storage behind every result-bearing primitive. It
//! moves from empty to either a value or an error exactly once; later
//! writes are ignored and reported.

use crate::error::{Error, Result};

use std::any::Any;
use std::fmt;

/// Observable state of a [`ValueCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Value,
    Error,
    /// The value was moved out by [`ValueCell::get`].
    Taken,
}

enum Slot<T> {
    Empty,
    Value(T),
    Error(Error),
    Taken,
}

/// A slot holding nothing, a value or an error.
pub struct ValueCell<T> {
    slot: Slot<T>,
}

impl<T> ValueCell<T> {
    pub const fn new() -> Self {
        Self { slot: Slot::Empty }
    }

    /// Stores `value`. Returns `false` if the cell was already written.
    pub fn set_value(&mut self, value: T) -> bool {
        self.fill(Slot::Value(value))
    }

    /// Stores `error`. Returns `false` if the cell was already written.
    pub fn set_error(&mut self, error: Error) -> bool {
        self.fill(Slot::Error(error))
    }

    /// Stores a result, dispatching on its variant.
    pub fn set_result(&mut self, result: Result<T>) -> bool {
        match result {
            Ok(value) => self.set_value(value),
            Err(error) => self.set_error(error),
        }
    }

    /// Captures a panic payload raised by a computation body.
    pub fn unhandled_exception(&mut self, payload: Box<dyn Any + Send>) -> bool {
        self.set_error(Error::from_panic(payload))
    }

    fn fill(&mut self, slot: Slot<T>) -> bool {
        if !matches!(self.slot, Slot::Empty) {
            tracing::warn!("value cell written twice, keeping the first result");
            return false;
        }

        self.slot = slot;
        true
    }

    /// Moves the value out, or re-raises the stored error.
    ///
    /// The error stays in place and is raised again on every call. Reading
    /// an empty cell fails with [`Error::NotReady`]; reading a value that
    /// was already moved out fails with [`Error::AlreadyAwaited`].
    pub fn get(&mut self) -> Result<T> {
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Taken => Err(Error::AlreadyAwaited),
            Slot::Empty => {
                self.slot = Slot::Empty;
                Err(Error::NotReady)
            }
            Slot::Error(error) => {
                self.slot = Slot::Error(error.clone());
                Err(error)
            }
        }
    }

    /// Borrows the value, or re-raises the stored error.
    pub fn get_ref(&self) -> Result<&T> {
        match &self.slot {
            Slot::Empty => Err(Error::NotReady),
            Slot::Value(value) => Ok(value),
            Slot::Error(error) => Err(error.clone()),
            Slot::Taken => Err(Error::AlreadyAwaited),
        }
    }

    /// Removes the stored error, leaving the cell taken.
    pub fn take_error(&mut self) -> Option<Error> {
        if !matches!(self.slot, Slot::Error(_)) {
            return None;
        }

        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn state(&self) -> CellState {
        match self.slot {
            Slot::Empty => CellState::Empty,
            Slot::Value(_) => CellState::Value,
            Slot::Error(_) => CellState::Error,
            Slot::Taken => CellState::Taken,
        }
    }

    pub fn has_value(&self) -> bool {
        matches!(self.slot, Slot::Value(_))
    }

    pub fn has_error(&self) -> bool {
        matches!(self.slot, Slot::Error(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.slot, Slot::Empty)
    }
}

impl<T: Clone> ValueCell<T> {
    /// Clones the value out, or re-raises the stored error.
    pub fn get_cloned(&self) -> Result<T> {
        self.get_ref().cloned()
    }
}

impl<T> Default for ValueCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ValueCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCell")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cell_is_not_ready() {
        let mut cell = ValueCell::<u32>::new();

        assert_eq!(cell.state(), CellState::Empty);
        assert!(matches!(cell.get(), Err(Error::NotReady)));
    }

    #[test]
    fn value_moves_out_once() {
        let mut cell = ValueCell::new();
        assert!(cell.set_value(String::from("v")));

        assert_eq!(cell.get().unwrap(), "v");
        assert_eq!(cell.state(), CellState::Taken);
        assert!(matches!(cell.get(), Err(Error::AlreadyAwaited)));
    }

    #[test]
    fn error_is_raised_on_every_read() {
        let mut cell = ValueCell::<()>::new();
        cell.set_error(Error::Canceled);

        assert!(cell.get().unwrap_err().is_canceled());
        assert!(cell.get().unwrap_err().is_canceled());
        assert!(cell.has_error());
    }

    #[test]
    fn first_write_wins() {
        let mut cell = ValueCell::new();

        assert!(cell.set_value(1));
        assert!(!cell.set_error(Error::Canceled));
        assert!(!cell.set_value(2));
        assert_eq!(cell.get().unwrap(), 1);
    }

    #[test]
    fn panic_payload_becomes_error() {
        let mut cell = ValueCell::<()>::new();
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();

        cell.unhandled_exception(payload);

        match cell.get() {
            Err(Error::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
