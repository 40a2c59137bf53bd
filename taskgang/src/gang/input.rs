// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

/// Supplies the batches a gang processes, one per cycle.
///
/// Returning `None` or an empty batch ends the run. The source is polled
/// from the driving thread only and must not block indefinitely.
pub trait InputSource<E>: Send {
    fn next_batch(&mut self) -> Option<Vec<E>>;
}

impl<E, F> InputSource<E> for F
where
    F: FnMut() -> Option<Vec<E>> + Send,
{
    fn next_batch(&mut self) -> Option<Vec<E>> {
        self()
    }
}

/// Feeds a gang from pre-partitioned batches.
#[derive(Debug)]
pub struct BatchIter<I> {
    batches: I,
}

impl<I: Iterator> BatchIter<I> {
    pub fn new<B>(batches: B) -> Self
    where
        B: IntoIterator<IntoIter = I>,
    {
        Self {
            batches: batches.into_iter(),
        }
    }
}

impl<E, I> InputSource<E> for BatchIter<I>
where
    I: Iterator<Item = Vec<E>> + Send,
{
    fn next_batch(&mut self) -> Option<Vec<E>> {
        self.batches.next()
    }
}
