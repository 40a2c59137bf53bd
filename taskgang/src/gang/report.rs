// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use serde::Serialize;

/// Outcome of one cycle, as tallied by the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub batch_size: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Elements that were never processed (stop requested or batch retired).
    pub skipped: usize,
}

/// Totals over a whole `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GangReport {
    pub cycles: u64,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub stopped: bool,
}

impl GangReport {
    pub(crate) fn absorb(&mut self, cycle: &CycleReport) {
        self.cycles += 1;
        self.processed += cycle.succeeded;
        self.failed += cycle.failed;
        self.skipped += cycle.skipped;
    }
}
