// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use super::report::CycleReport;

/// Decides after each completed cycle whether the gang pulls another batch.
#[derive(Default)]
pub enum Advance {
    /// Stop after the first cycle.
    #[default]
    OneShot,
    /// Keep going until the input source is exhausted.
    UntilExhausted,
    /// Stop once this many cycles have completed.
    MaxCycles(u64),
    Custom(Box<dyn FnMut(&CycleReport) -> bool + Send>),
}

impl Advance {
    pub fn custom(decide: impl FnMut(&CycleReport) -> bool + Send + 'static) -> Self {
        Advance::Custom(Box::new(decide))
    }

    pub(crate) fn should_advance(&mut self, report: &CycleReport) -> bool {
        match self {
            Advance::OneShot => false,
            Advance::UntilExhausted => true,
            Advance::MaxCycles(max) => report.cycle < *max,
            Advance::Custom(decide) => decide(report),
        }
    }
}

impl std::fmt::Debug for Advance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advance::OneShot => write!(f, "OneShot"),
            Advance::UntilExhausted => write!(f, "UntilExhausted"),
            Advance::MaxCycles(max) => write!(f, "MaxCycles({max})"),
            Advance::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
