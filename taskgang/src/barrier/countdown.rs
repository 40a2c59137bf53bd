// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use super::{BarrierError, CycleBarrier, FailurePolicy, Ledger};

#[derive(Debug, Default)]
struct Latch {
    ledger: Ledger,
    aborted: bool,
}

/// Countdown latch sized to the batch of the current cycle.
///
/// Each distinct index of the current cycle counts down once (failures only
/// under [`FailurePolicy::CountFailures`]). The driver waits until the count
/// reaches zero, the optional timeout expires or the barrier is aborted.
#[derive(Debug)]
pub struct CountdownBarrier {
    latch: Mutex<Latch>,
    released: Condvar,
    policy: FailurePolicy,
    timeout: Option<Duration>,
}

impl Default for CountdownBarrier {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}

impl CountdownBarrier {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            latch: Mutex::new(Latch::default()),
            released: Condvar::new(),
            policy,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Elements of the current cycle that have not counted down yet.
    pub fn outstanding(&self) -> usize {
        self.lock().ledger.outstanding
    }

    fn lock(&self) -> MutexGuard<'_, Latch> {
        self.latch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arrive(&self, cycle: u64, index: usize, counts: bool) {
        let mut latch = self.lock();
        if latch.ledger.record(cycle, index, counts) && latch.ledger.outstanding == 0 {
            debug!("cycle {cycle} released");
            self.released.notify_all();
        }
    }
}

impl CycleBarrier for CountdownBarrier {
    fn initiate(&self, cycle: u64, batch_size: usize) {
        self.lock().ledger.reset(cycle, batch_size);
    }

    fn task_done(&self, cycle: u64, index: usize) {
        self.arrive(cycle, index, true);
    }

    fn task_failed(&self, cycle: u64, index: usize) {
        self.arrive(cycle, index, self.policy.counts_failures());
    }

    fn await_done(&self) -> Result<(), BarrierError> {
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut latch = self.lock();
        while latch.ledger.outstanding > 0 && !latch.aborted {
            latch = match deadline {
                None => self
                    .released
                    .wait(latch)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(BarrierError::TimedOut {
                            cycle: latch.ledger.cycle,
                            outstanding: latch.ledger.outstanding,
                        });
                    }
                    self.released
                        .wait_timeout(latch, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        if latch.aborted {
            return Err(BarrierError::Aborted);
        }
        Ok(())
    }

    fn abort(&self) {
        self.lock().aborted = true;
        self.released.notify_all();
    }
}
