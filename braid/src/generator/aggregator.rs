use super::{Charge, Generator};
use crate::error::{Error, Result};
use crate::sync::Queue;

use std::fmt;

/// Merges several generators into one stream of items.
///
/// Every inner generator is charged with a callback that pushes its next
/// outcome, tagged with the producer's index, into an internal queue. Items
/// come out in the order they were produced, and the producer that made an
/// item is charged again once that item is handed out.
///
/// Dropping the aggregator waits for charges that are still in flight.
pub struct Aggregator<T> {
    queue: Queue<(usize, Charge<T>)>,
    in_flight: usize,
}

impl<T: Send + 'static> Aggregator<T> {
    pub fn new<I>(generators: I) -> Self
    where
        I: IntoIterator<Item = Generator<T>>,
    {
        let mut aggregator = Self {
            queue: Queue::new(),
            in_flight: 0,
        };

        for (id, generator) in generators.into_iter().enumerate() {
            aggregator.charge(id, generator);
        }

        aggregator
    }

    fn charge(&mut self, id: usize, generator: Generator<T>) {
        let queue = self.queue.clone();
        self.in_flight += 1;

        generator.charge(move |charge| {
            if queue.push((id, charge)).is_err() {
                tracing::debug!(producer = id, "aggregator queue closed before a charge landed");
            }
        });
    }

    /// Waits for the next item of any producer.
    ///
    /// Returns `None` once every producer ended. A producer that fails
    /// surfaces its error here and is not charged again.
    pub async fn next(&mut self) -> Result<Option<(usize, T)>> {
        while self.in_flight > 0 {
            let (id, charge) = self.queue.pop().await?;
            self.in_flight -= 1;

            match charge {
                Charge::Item(generator, value) => {
                    self.charge(id, generator);
                    return Ok(Some((id, value)));
                }
                Charge::Done => continue,
                Charge::Failed(error) => return Err(error),
            }
        }

        Ok(None)
    }

    /// Number of producers still running.
    pub fn remaining(&self) -> usize {
        self.in_flight
    }

    /// Turns the aggregator into a generator yielding the merged items.
    pub fn into_generator(mut self) -> Generator<T> {
        Generator::new(move |co| async move {
            while let Some((_, value)) = self.next().await? {
                co.yield_(value).await;
            }

            Ok::<_, Error>(())
        })
    }
}

impl<T> Drop for Aggregator<T> {
    fn drop(&mut self) {
        while self.in_flight > 0 {
            let pop = self.queue.pop();

            if crate::block_on(pop).is_err() {
                break;
            }

            self.in_flight -= 1;
        }
    }
}

impl<T> fmt::Debug for Aggregator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
