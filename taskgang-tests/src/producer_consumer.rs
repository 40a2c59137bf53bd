// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use bounded_queue::{make_queue, BoundedQueue, QueueError, QueueKind};
use serde::{Deserialize, Serialize};

/// Outcome of one producer/consumer pass over a bounded queue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QueueCheck {
    pub items: u64,
    pub capacity: usize,
    pub consumed: u64,
    /// Elements that arrived out of sequence (gaps or repeats).
    pub out_of_order: u64,
    pub elapsed: Duration,
}

impl QueueCheck {
    pub fn passed(&self) -> bool {
        self.consumed == self.items && self.out_of_order == 0
    }
}

/// One producer puts `0..items` while one consumer takes the same number of
/// elements and counts every value that is not the expected successor.
pub fn run_check(kind: QueueKind, capacity: usize, items: u64) -> anyhow::Result<QueueCheck> {
    let queue = make_queue::<u64>(kind, capacity)?;
    let started = Instant::now();

    let producer = {
        let queue = queue.clone();
        thread::Builder::new()
            .name("producer".into())
            .spawn(move || -> anyhow::Result<()> {
                for i in 0..items {
                    queue.put(i)?;
                }
                Ok(())
            })
            .context("failed to spawn producer")?
    };

    let consumer = {
        let queue = queue.clone();
        thread::Builder::new()
            .name("consumer".into())
            .spawn(move || consume(&*queue, items))
            .context("failed to spawn consumer")?
    };

    producer
        .join()
        .map_err(|_| anyhow!("producer panicked"))??;
    let (consumed, out_of_order) = consumer
        .join()
        .map_err(|_| anyhow!("consumer panicked"))??;

    Ok(QueueCheck {
        items,
        capacity,
        consumed,
        out_of_order,
        elapsed: started.elapsed(),
    })
}

/// Take up to `items` elements, stopping early if the queue is closed and
/// drained. Returns how many were taken and how many broke the sequence.
fn consume(queue: &dyn BoundedQueue<u64>, items: u64) -> anyhow::Result<(u64, u64)> {
    let mut consumed = 0;
    let mut expected = 0;
    let mut out_of_order = 0;
    while consumed < items {
        let value = match queue.take() {
            Ok(value) => value,
            Err(QueueError::Closed) => break,
            Err(e) => return Err(e.into()),
        };
        consumed += 1;
        if value != expected {
            out_of_order += 1;
        }
        expected = value + 1;
    }
    Ok((consumed, out_of_order))
}
