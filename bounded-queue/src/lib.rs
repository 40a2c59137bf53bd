// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! # Bounded producer/consumer queues
//!
//! A fixed-capacity FIFO buffer shared by any number of producer and
//! consumer threads. Producers block while the buffer is full, consumers
//! block while it is empty.
//!
//! Two interchangeable implementations sit behind [`BoundedQueue`]:
//!
//! - [`BlockingQueue`] parks waiting threads on a condition variable.
//! - [`BusyQueue`] spins on the non-blocking path until it can proceed.
//!
//! Both give the same ordering guarantees and only differ in how much CPU a
//! waiting thread burns.
//!
//! ```text
//!         producer ---put---> +---------------------+ ---take---> consumer
//!         producer ---put---> | e0 | e1 | .. | eC-1 | ---take---> consumer
//!                             +---------------------+
//!                              not_full    not_empty
//! ```

use std::sync::Arc;
use std::time::Duration;

pub mod blocking;
pub mod busy;
pub mod error;
pub mod interrupt;

pub use blocking::BlockingQueue;
pub use busy::BusyQueue;
pub use error::QueueError;
pub use interrupt::Interrupt;

/// Capability shared by all bounded queue variants.
pub trait BoundedQueue<T: Send>: Send + Sync {
    /// Append `element`, blocking while the queue is full.
    fn put(&self, element: T) -> Result<(), QueueError>;

    /// Like [`BoundedQueue::put`], but gives up with
    /// [`QueueError::Interrupted`] once `interrupt` is raised.
    fn put_interruptibly(&self, element: T, interrupt: &Interrupt) -> Result<(), QueueError>;

    /// Remove the head element, blocking while the queue is empty.
    fn take(&self) -> Result<T, QueueError>;

    fn take_interruptibly(&self, interrupt: &Interrupt) -> Result<T, QueueError>;

    /// Append `element` if there is spare capacity. Hands the element back
    /// when the queue is full or closed.
    fn offer(&self, element: T) -> Result<(), T>;

    /// Remove the head element if there is one.
    fn poll(&self) -> Option<T>;

    /// Wait up to `timeout` for an element. `None` on expiry or when the
    /// queue is closed and empty.
    fn poll_timeout(&self, timeout: Duration) -> Option<T>;

    /// Number of buffered elements. Advisory under concurrent access.
    fn size(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Reject further inserts and wake every waiter. Buffered elements can
    /// still be taken.
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Remove every buffered element in FIFO order.
    fn drain(&self) -> Vec<T>;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }
}

/// Selects a [`BoundedQueue`] implementation at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum QueueKind {
    /// Waiters sleep on a condition variable.
    #[default]
    Blocking,
    /// Waiters spin on `offer`/`poll`.
    Busy,
}

pub fn make_queue<T: Send + 'static>(
    kind: QueueKind,
    capacity: usize,
) -> Result<Arc<dyn BoundedQueue<T>>, QueueError> {
    let queue: Arc<dyn BoundedQueue<T>> = match kind {
        QueueKind::Blocking => Arc::new(BlockingQueue::new(capacity)?),
        QueueKind::Busy => Arc::new(BusyQueue::new(capacity)?),
    };
    Ok(queue)
}

#[cfg(test)]
mod tests;
