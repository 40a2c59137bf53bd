// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Flag a controlling thread raises to abandon blocked queue calls.
///
/// Clones share the same flag. A thread blocked in one of the
/// `*_interruptibly` calls notices the flag within [`Interrupt::POLL_SLICE`].
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub const POLL_SLICE: Duration = Duration::from_millis(5);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Lower the flag so the handle can be reused.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }
}
