// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};
use thiserror::Error;

use super::advance::Advance;
use super::input::{BatchIter, InputSource};
use super::progress::{LogSink, Progress, ProgressSink};
use super::report::{CycleReport, GangReport};
use crate::barrier::{BarrierError, CountdownBarrier, CycleBarrier};
use crate::executor::{Executor, Task};

/// Per-element work function. Failures are reported through the result.
pub type Processor<E> = dyn Fn(&E, TaskContext) -> anyhow::Result<()> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GangState {
    AwaitingInput,
    Dispatching,
    AwaitingCompletion,
    Done,
}

/// Where an element sits: which cycle, which position in the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    pub cycle: u64,
    pub index: usize,
}

/// Argument of the cycle-start hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStart {
    pub cycle: u64,
    pub batch_size: usize,
}

#[derive(Debug, Error)]
pub enum GangError {
    #[error("no input source configured")]
    MissingInput,

    #[error("no element processor configured")]
    MissingProcessor,

    #[error("the gang already ran to completion")]
    AlreadyDone,

    #[error(transparent)]
    Barrier(#[from] BarrierError),
}

#[derive(Debug)]
struct Batch<E> {
    cycle: u64,
    items: Vec<E>,
}

/// The batch workers look their elements up in.
#[derive(Debug)]
struct ActiveBatch<E> {
    current: RwLock<Option<Arc<Batch<E>>>>,
}

impl<E> ActiveBatch<E> {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    fn replace(&self, batch: Option<Arc<Batch<E>>>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = batch;
    }

    /// The batch of `cycle`, unless another cycle has taken its place.
    fn lookup(&self, cycle: u64) -> Option<Arc<Batch<E>>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|batch| batch.cycle == cycle)
            .cloned()
    }
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl Tally {
    fn snapshot(&self, cycle: u64, batch_size: usize) -> CycleReport {
        CycleReport {
            cycle,
            batch_size,
            succeeded: self.succeeded.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

/// Asks a running gang to stop.
///
/// No further cycle begins, undispatched work is skipped and the barrier is
/// aborted so `run()` returns promptly.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    barrier: Arc<dyn CycleBarrier>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!("Stop requested");
        }
        self.barrier.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Runs cycles of concurrent per-element processing over a sequence of
/// input batches. See the module documentation for the state machine.
pub struct TaskGang<E> {
    executor: Arc<dyn Executor>,
    input: Box<dyn InputSource<E>>,
    processor: Arc<Processor<E>>,
    on_cycle_start: Option<Box<dyn FnMut(CycleStart) + Send>>,
    barrier: Arc<dyn CycleBarrier>,
    advance: Advance,
    sink: Arc<dyn ProgressSink>,
    active: Arc<ActiveBatch<E>>,
    stopped: Arc<AtomicBool>,
    cycle: u64,
    state: GangState,
}

impl<E: Send + Sync + 'static> TaskGang<E> {
    pub fn builder(executor: Arc<dyn Executor>) -> TaskGangBuilder<E> {
        TaskGangBuilder {
            executor,
            input: None,
            processor: None,
            on_cycle_start: None,
            barrier: None,
            advance: Advance::default(),
            sink: None,
        }
    }

    pub fn state(&self) -> GangState {
        self.state
    }

    /// Number of batches begun so far.
    pub fn current_cycle(&self) -> u64 {
        self.cycle
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stopped: self.stopped.clone(),
            barrier: self.barrier.clone(),
        }
    }

    /// Drive the gang until the input is exhausted, the advance policy says
    /// stop or a stop is requested. Blocks the calling thread throughout.
    ///
    /// A barrier error aborts the barrier before returning, so it cannot be
    /// reused afterwards.
    pub fn run(&mut self) -> Result<GangReport, GangError> {
        if self.state == GangState::Done {
            return Err(GangError::AlreadyDone);
        }

        let mut report = GangReport::default();
        let outcome = self.drive(&mut report);
        if let Err(e) = &outcome {
            // workers of the failed cycle may still be blocked reporting to the barrier
            debug!("Aborting barrier after error: {e}");
            self.barrier.abort();
        }

        self.active.replace(None);
        self.state = GangState::Done;
        report.stopped = matches!(outcome, Ok(true));
        self.sink.notify(&Progress::Finished(report));

        outcome.map(|_| report)
    }

    /// Returns whether the run ended because a stop was requested.
    fn drive(&mut self, report: &mut GangReport) -> Result<bool, GangError> {
        loop {
            self.state = GangState::AwaitingInput;
            if self.stopped.load(Ordering::Acquire) {
                return Ok(true);
            }
            let items = match self.input.next_batch() {
                Some(items) if !items.is_empty() => items,
                _ => {
                    debug!("Input exhausted after {} cycle(s)", self.cycle);
                    return Ok(false);
                }
            };

            self.cycle += 1;
            let cycle = self.cycle;
            let batch_size = items.len();
            self.active.replace(Some(Arc::new(Batch { cycle, items })));

            self.barrier.initiate(cycle, batch_size);
            if let Some(hook) = self.on_cycle_start.as_mut() {
                hook(CycleStart { cycle, batch_size });
            }
            self.sink
                .notify(&Progress::CycleStarted { cycle, batch_size });

            self.state = GangState::Dispatching;
            let tally = Arc::new(Tally::default());
            for index in 0..batch_size {
                self.dispatch(cycle, index, &tally);
            }

            self.state = GangState::AwaitingCompletion;
            let awaited = self.barrier.await_done();
            let cycle_report = tally.snapshot(cycle, batch_size);
            report.absorb(&cycle_report);
            match awaited {
                Ok(()) => {}
                Err(BarrierError::Aborted) => {
                    debug!("Cycle {cycle} aborted");
                    return Ok(true);
                }
                Err(e) => return Err(e.into()),
            }
            self.sink.notify(&Progress::CycleCompleted(cycle_report));

            if !self.advance.should_advance(&cycle_report) {
                return Ok(false);
            }
        }
    }

    fn dispatch(&self, cycle: u64, index: usize, tally: &Arc<Tally>) {
        let task = self.make_task(cycle, index, tally.clone());
        if let Err(e) = self.executor.execute(task) {
            warn!("Could not submit element {index} of cycle {cycle}: {e}");
            tally.failed.fetch_add(1, Ordering::AcqRel);
            self.barrier.task_failed(cycle, index);
        }
    }

    fn make_task(&self, cycle: u64, index: usize, tally: Arc<Tally>) -> Task {
        let active = self.active.clone();
        let processor = self.processor.clone();
        let barrier = self.barrier.clone();
        let stopped = self.stopped.clone();

        Box::new(move || {
            if stopped.load(Ordering::Acquire) {
                tally.skipped.fetch_add(1, Ordering::AcqRel);
                return;
            }
            let Some(batch) = active.lookup(cycle) else {
                debug!("Cycle {cycle} is no longer active, skipping element {index}");
                tally.skipped.fetch_add(1, Ordering::AcqRel);
                return;
            };
            let Some(element) = batch.items.get(index) else {
                debug!("Element {index} not found in cycle {cycle}");
                tally.skipped.fetch_add(1, Ordering::AcqRel);
                return;
            };

            let context = TaskContext { cycle, index };
            match panic::catch_unwind(AssertUnwindSafe(|| processor(element, context))) {
                Ok(Ok(())) => {
                    tally.succeeded.fetch_add(1, Ordering::AcqRel);
                    barrier.task_done(cycle, index);
                }
                Ok(Err(e)) => {
                    warn!("Element {index} of cycle {cycle} failed: {e:#}");
                    tally.failed.fetch_add(1, Ordering::AcqRel);
                    barrier.task_failed(cycle, index);
                }
                Err(_) => {
                    warn!("Element {index} of cycle {cycle} panicked");
                    tally.failed.fetch_add(1, Ordering::AcqRel);
                    barrier.task_failed(cycle, index);
                }
            }
        })
    }
}

impl<E> std::fmt::Debug for TaskGang<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGang")
            .field("cycle", &self.cycle)
            .field("state", &self.state)
            .field("advance", &self.advance)
            .finish()
    }
}

pub struct TaskGangBuilder<E> {
    executor: Arc<dyn Executor>,
    input: Option<Box<dyn InputSource<E>>>,
    processor: Option<Arc<Processor<E>>>,
    on_cycle_start: Option<Box<dyn FnMut(CycleStart) + Send>>,
    barrier: Option<Arc<dyn CycleBarrier>>,
    advance: Advance,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl<E: Send + Sync + 'static> TaskGangBuilder<E> {
    pub fn input(mut self, source: impl InputSource<E> + 'static) -> Self {
        self.input = Some(Box::new(source));
        self
    }

    /// Shorthand for feeding pre-partitioned batches.
    pub fn batches<B>(self, batches: B) -> Self
    where
        B: IntoIterator<Item = Vec<E>>,
        B::IntoIter: Send + 'static,
    {
        self.input(BatchIter::new(batches))
    }

    pub fn processor(
        self,
        process: impl Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.processor_with_context(move |element, _| process(element))
    }

    pub fn processor_with_context(
        mut self,
        process: impl Fn(&E, TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.processor = Some(Arc::new(process));
        self
    }

    /// Called on the driving thread once per cycle, after the barrier has
    /// been initiated and before any element is dispatched.
    pub fn on_cycle_start(mut self, hook: impl FnMut(CycleStart) + Send + 'static) -> Self {
        self.on_cycle_start = Some(Box::new(hook));
        self
    }

    /// Defaults to a [`CountdownBarrier`] that counts failures.
    pub fn barrier(mut self, barrier: Arc<dyn CycleBarrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn advance(mut self, advance: Advance) -> Self {
        self.advance = advance;
        self
    }

    /// Defaults to [`LogSink`].
    pub fn sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> Result<TaskGang<E>, GangError> {
        let input = self.input.ok_or(GangError::MissingInput)?;
        let processor = self.processor.ok_or(GangError::MissingProcessor)?;
        Ok(TaskGang {
            executor: self.executor,
            input,
            processor,
            on_cycle_start: self.on_cycle_start,
            barrier: self
                .barrier
                .unwrap_or_else(|| Arc::new(CountdownBarrier::default()) as Arc<dyn CycleBarrier>),
            advance: self.advance,
            sink: self
                .sink
                .unwrap_or_else(|| Arc::new(LogSink) as Arc<dyn ProgressSink>),
            active: Arc::new(ActiveBatch::new()),
            stopped: Arc::new(AtomicBool::new(false)),
            cycle: 0,
            state: GangState::AwaitingInput,
        })
    }
}
