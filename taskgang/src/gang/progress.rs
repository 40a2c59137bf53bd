// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use log::info;

use super::report::{CycleReport, GangReport};

/// Human-readable progress notices emitted by the driving thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    CycleStarted { cycle: u64, batch_size: usize },
    CycleCompleted(CycleReport),
    Finished(GangReport),
}

/// Receives [`Progress`] notices. Purely diagnostic.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, progress: &Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn notify(&self, progress: &Progress) {
        self(progress)
    }
}

/// Default sink, forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn notify(&self, progress: &Progress) {
        match progress {
            Progress::CycleStarted { cycle, batch_size } => info!(
                ">>> Started cycle {cycle} with {batch_size} task{} <<<",
                if *batch_size == 1 { "" } else { "s" }
            ),
            Progress::CycleCompleted(report) => info!(
                "Cycle {} done: {} succeeded, {} failed, {} skipped",
                report.cycle, report.succeeded, report.failed, report.skipped
            ),
            Progress::Finished(report) => info!(
                "Gang finished after {} cycle(s), {} element(s) processed{}",
                report.cycles,
                report.processed,
                if report.stopped { " (stopped)" } else { "" }
            ),
        }
    }
}
