// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! # Design: Cyclic Task Gang
//!
//! ## Overview
//! A gang processes a changing sequence of input batches. For every batch
//! ("cycle") it fans one task per element out to a shared executor, waits on
//! a completion barrier for the whole batch and then decides whether to pull
//! the next batch.
//!
//! - The caller's thread drives the cycle state machine and blocks in `run()`.
//! - All per-element work happens on the executor.
//! - Cycles are strictly sequential, elements within a cycle are not ordered.
//! - Every step is a strategy injected through the builder: input source,
//!   cycle-start hook, element processor, completion barrier, advance policy
//!   and progress sink.
//!
//!
//! ```text
//!         +---------------+   next_batch()   +--------------+
//!         | AwaitingInput |<-----------------| InputSource  |
//!         +-------+-------+                  +--------------+
//!                 | batch                     None -> Done
//!                 v
//!         +-------+-------+  execute(task)   +--------------+
//!         |  Dispatching  |----------------->|   Executor   |
//!         +-------+-------+                  +------+-------+
//!                 |                                 | task_done(cycle, i)
//!                 v                                 v
//!      +----------+---------+  await_done()  +--------------+
//!      | AwaitingCompletion |--------------->| CycleBarrier |
//!      +----------+---------+                +--------------+
//!                 |
//!                 v  Advance says continue -> AwaitingInput, else Done
//! ```

pub mod advance;
pub mod input;
pub mod progress;
pub mod report;
pub mod task_gang;

pub use advance::Advance;
pub use input::{BatchIter, InputSource};
pub use progress::{LogSink, Progress, ProgressSink};
pub use report::{CycleReport, GangReport};
pub use task_gang::{
    CycleStart, GangError, GangState, StopHandle, TaskContext, TaskGang, TaskGangBuilder,
};
