// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use async_channel::{Receiver, Sender};
use log::{debug, info, warn};

use super::{Executor, ExecutorError, Task};

/// Fixed set of worker threads fed from one unbounded channel.
#[derive(Debug)]
pub struct WorkerPool {
    tx: Mutex<Option<Sender<Task>>>,
    thread_handles: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, ExecutorError> {
        if size == 0 {
            return Err(ExecutorError::NoWorkers);
        }
        let (tx, rx) = async_channel::unbounded();

        let mut thread_handles = Vec::with_capacity(size);
        for id in 0..size {
            let rx_in_thread: Receiver<Task> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("taskgang-worker-{id}"))
                .spawn(move || worker_loop(id, rx_in_thread))?;
            thread_handles.push(handle);
        }
        info!("Started worker pool with {size} thread(s)");

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            thread_handles: Mutex::new(thread_handles),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks that were submitted but not picked up by a worker yet.
    pub fn pending(&self) -> usize {
        self.sender().as_ref().map_or(0, |tx| tx.len())
    }

    /// Stop accepting tasks. Already queued tasks still run.
    pub fn close(&self) {
        if self.sender().take().is_some() {
            debug!("Worker pool closed, draining queued tasks");
        }
    }

    /// Close the pool and join every worker once the queue is drained.
    pub fn wait_until_finished(&self) {
        self.close();
        let handles: Vec<JoinHandle<()>> = self
            .thread_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let current = thread::current().id();
        for handle in handles {
            // the last owner may be one of our own workers
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("A worker thread exited with a panic");
            }
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<Sender<Task>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Executor for WorkerPool {
    fn execute(&self, task: Task) -> Result<(), ExecutorError> {
        let tx = self.sender().clone().ok_or(ExecutorError::Closed)?;
        tx.send_blocking(task).map_err(|_| ExecutorError::Closed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.wait_until_finished();
    }
}

fn worker_loop(id: usize, rx: Receiver<Task>) {
    debug!("Worker {id} waiting for tasks");
    while let Ok(task) = rx.recv_blocking() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("Task on worker {id} panicked, worker keeps running");
        }
    }
    debug!("Worker {id} ended, channel closed");
}
