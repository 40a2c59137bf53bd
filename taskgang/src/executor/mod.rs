// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! Executors the gang fans its per-element work out to.
//!
//! The gang only needs eventual execution of each submitted task; neither
//! ordering across submissions nor the thread a task runs on is promised.
//! Executors are shared and may run unrelated work at the same time.

use thiserror::Error;

pub mod worker_pool;

pub use worker_pool::WorkerPool;

/// One unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor has been closed")]
    Closed,

    #[error("a worker pool needs at least one thread")]
    NoWorkers,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub trait Executor: Send + Sync {
    /// Queue `task` for execution. Must not wait for the task to run.
    fn execute(&self, task: Task) -> Result<(), ExecutorError>;
}

impl Executor for futures::executor::ThreadPool {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        self.spawn_ok(async move { task() });
        Ok(())
    }
}

/// Runs every task immediately on the submitting thread.
///
/// Useful for deterministic tests. A gang using it processes its whole batch
/// during dispatch, so there is no fan-out.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        task();
        Ok(())
    }
}
