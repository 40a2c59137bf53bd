// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

pub mod barrier;
pub mod config;
pub mod executor;
pub mod gang;
pub mod gangs;

pub use barrier::{
    BarrierError, CompletionQueueBarrier, CountdownBarrier, CycleBarrier, FailurePolicy,
};
pub use config::GangConfig;
pub use executor::{Executor, ExecutorError, InlineExecutor, Task, WorkerPool};
pub use gang::{Advance, GangError, GangReport, TaskGang};
