//! Generators: bodies that produce a sequence of values on demand.
//!
//! A [`Generator`] can be consumed asynchronously through
//! [`Generator::next`], synchronously through its blocking iterator, or in
//! callback style through [`Generator::charge`]. An [`Aggregator`] merges
//! several generators into one.

mod aggregator;
mod co;
#[allow(clippy::module_inception)]
mod generator;

pub use aggregator::Aggregator;
pub use co::{Co, Yield};
pub use generator::{Charge, Generator, IntoIter, Iter, Next};
