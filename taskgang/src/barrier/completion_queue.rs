// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bounded_queue::{make_queue, BoundedQueue, QueueError, QueueKind};
use log::{debug, warn};

use super::{BarrierError, CycleBarrier, FailurePolicy, Ledger};

/// Report a worker sends to the driver when it finishes one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub cycle: u64,
    pub index: usize,
    pub succeeded: bool,
}

/// Barrier fed through a bounded queue of [`Completion`] events.
///
/// Workers `put` one event per element and block while the queue is full,
/// so a slow driver throttles the gang. The driver drains events in
/// `await_done` until every index of the cycle is accounted for.
///
/// With an executor that runs tasks on the submitting thread the queue must
/// hold a whole batch, since nothing drains it before dispatch finishes.
pub struct CompletionQueueBarrier {
    events: Arc<dyn BoundedQueue<Completion>>,
    ledger: Mutex<Ledger>,
    aborted: AtomicBool,
    policy: FailurePolicy,
    timeout: Option<Duration>,
}

impl CompletionQueueBarrier {
    const WAIT_SLICE: Duration = Duration::from_millis(10);

    pub fn new(
        kind: QueueKind,
        capacity: usize,
        policy: FailurePolicy,
    ) -> Result<Self, QueueError> {
        Ok(Self::with_queue(make_queue(kind, capacity)?, policy))
    }

    pub fn with_queue(events: Arc<dyn BoundedQueue<Completion>>, policy: FailurePolicy) -> Self {
        Self {
            events,
            ledger: Mutex::new(Ledger::default()),
            aborted: AtomicBool::new(false),
            policy,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, completion: Completion) {
        if let Err(e) = self.events.put(completion) {
            // only happens after abort closed the queue
            debug!("dropping {completion:?}: {e}");
        }
    }
}

impl std::fmt::Debug for CompletionQueueBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionQueueBarrier")
            .field("buffered", &self.events.size())
            .field("capacity", &self.events.capacity())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CycleBarrier for CompletionQueueBarrier {
    fn initiate(&self, cycle: u64, batch_size: usize) {
        let stale = self.events.drain();
        if !stale.is_empty() {
            warn!("discarding {} completion(s) left over before cycle {cycle}", stale.len());
        }
        self.lock().reset(cycle, batch_size);
    }

    fn task_done(&self, cycle: u64, index: usize) {
        self.send(Completion {
            cycle,
            index,
            succeeded: true,
        });
    }

    fn task_failed(&self, cycle: u64, index: usize) {
        self.send(Completion {
            cycle,
            index,
            succeeded: false,
        });
    }

    fn await_done(&self) -> Result<(), BarrierError> {
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        loop {
            if self.aborted.load(Ordering::Acquire) {
                return Err(BarrierError::Aborted);
            }
            let (cycle, outstanding) = {
                let ledger = self.lock();
                (ledger.cycle, ledger.outstanding)
            };
            if outstanding == 0 {
                return Ok(());
            }

            let mut slice = Self::WAIT_SLICE;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(BarrierError::TimedOut { cycle, outstanding });
                }
                slice = slice.min(deadline - now);
            }

            if let Some(completion) = self.events.poll_timeout(slice) {
                let counts = completion.succeeded || self.policy.counts_failures();
                self.lock()
                    .record(completion.cycle, completion.index, counts);
            }
        }
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.events.close();
    }
}
