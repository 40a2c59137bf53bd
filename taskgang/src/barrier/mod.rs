// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! Completion barriers the gang driver blocks on during a cycle.
//!
//! A barrier is (re)initialised with the size of every new batch, receives
//! one report per finished element from the worker threads and releases the
//! single waiting driver once the cycle counts as complete.
//!
//! Reports are tagged with the cycle they belong to. Reports for another
//! cycle, indices outside the batch and repeated indices are dropped, so a
//! late or duplicated report can neither release a cycle early nor
//! underflow the count.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod completion_queue;
pub mod countdown;

pub use completion_queue::CompletionQueueBarrier;
pub use countdown::CountdownBarrier;

/// What a failed element means for the completion count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// A failed element still counts, so the cycle can finish.
    #[default]
    CountFailures,
    /// Only successes count. A failure keeps the cycle open until the
    /// barrier times out or is aborted.
    BlockOnFailure,
}

impl FailurePolicy {
    pub fn counts_failures(self) -> bool {
        self == FailurePolicy::CountFailures
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("cycle {cycle} timed out with {outstanding} element(s) outstanding")]
    TimedOut { cycle: u64, outstanding: usize },

    #[error("barrier aborted")]
    Aborted,
}

/// Synchronisation strategy for one cycle of a gang.
///
/// `initiate` and `await_done` are only called by the driving thread;
/// `task_done`/`task_failed` are called concurrently from workers.
pub trait CycleBarrier: Send + Sync {
    /// Reset for a new batch of `batch_size` elements.
    fn initiate(&self, cycle: u64, batch_size: usize);

    /// Element `index` of `cycle` was processed successfully.
    fn task_done(&self, cycle: u64, index: usize);

    /// Element `index` of `cycle` could not be processed.
    fn task_failed(&self, cycle: u64, index: usize);

    /// Block until the current cycle is complete.
    fn await_done(&self) -> Result<(), BarrierError>;

    /// Release the waiter for good. Every later `await_done` returns
    /// [`BarrierError::Aborted`].
    fn abort(&self);
}

/// Per-cycle record of which indices already reported.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub(crate) cycle: u64,
    pub(crate) outstanding: usize,
    reported: Vec<bool>,
}

impl Ledger {
    pub(crate) fn reset(&mut self, cycle: u64, batch_size: usize) {
        self.cycle = cycle;
        self.outstanding = batch_size;
        self.reported.clear();
        self.reported.resize(batch_size, false);
    }

    /// Record a report and tell whether it changed the outstanding count.
    pub(crate) fn record(&mut self, cycle: u64, index: usize, counts: bool) -> bool {
        if cycle != self.cycle {
            log::debug!("ignoring report for cycle {cycle}, current cycle is {}", self.cycle);
            return false;
        }
        match self.reported.get_mut(index) {
            None => {
                log::debug!("ignoring report for unknown index {index} in cycle {cycle}");
                false
            }
            Some(true) => {
                log::debug!("ignoring repeated report for index {index} in cycle {cycle}");
                false
            }
            Some(seen) => {
                *seen = true;
                if counts && self.outstanding > 0 {
                    self.outstanding -= 1;
                    true
                } else {
                    false
                }
            }
        }
    }
}
