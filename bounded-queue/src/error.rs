// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// A blocking wait was abandoned because its [`crate::Interrupt`] was raised.
    #[error("operation interrupted while waiting on the queue")]
    Interrupted,

    #[error("queue has been closed")]
    Closed,
}
