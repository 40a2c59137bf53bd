// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::{BoundedQueue, Interrupt, QueueError};

#[derive(Debug)]
struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

/// Bounded queue whose waiters sleep on a condition variable.
///
/// A single mutex guards the buffer. `put` waits on `not_full`, `take` waits
/// on `not_empty`, and every state change broadcasts to the other side since
/// several producers and consumers may wait at once.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T: Send> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity(capacity));
        }
        Ok(Self {
            state: Mutex::new(State {
                buffer: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // the buffer is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, state: &State<T>) -> bool {
        state.buffer.len() < self.capacity
    }

    fn insert(&self, mut state: MutexGuard<'_, State<T>>, element: T) -> Result<(), QueueError> {
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.buffer.push_back(element);
        debug!("put: {} of {} slots used", state.buffer.len(), self.capacity);
        drop(state);
        self.not_empty.notify_all();
        Ok(())
    }

    fn remove(&self, mut state: MutexGuard<'_, State<T>>) -> Result<T, QueueError> {
        let element = state.buffer.pop_front().ok_or(QueueError::Closed)?;
        drop(state);
        self.not_full.notify_all();
        Ok(element)
    }
}

impl<T: Send> BoundedQueue<T> for BlockingQueue<T> {
    fn put(&self, element: T) -> Result<(), QueueError> {
        let mut state = self.lock();
        while !self.has_room(&state) && !state.closed {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.insert(state, element)
    }

    fn put_interruptibly(&self, element: T, interrupt: &Interrupt) -> Result<(), QueueError> {
        let mut state = self.lock();
        while !self.has_room(&state) && !state.closed {
            if interrupt.is_raised() {
                return Err(QueueError::Interrupted);
            }
            state = self
                .not_full
                .wait_timeout(state, Interrupt::POLL_SLICE)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        self.insert(state, element)
    }

    fn take(&self) -> Result<T, QueueError> {
        let mut state = self.lock();
        while state.buffer.is_empty() && !state.closed {
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.remove(state)
    }

    fn take_interruptibly(&self, interrupt: &Interrupt) -> Result<T, QueueError> {
        let mut state = self.lock();
        while state.buffer.is_empty() && !state.closed {
            if interrupt.is_raised() {
                return Err(QueueError::Interrupted);
            }
            state = self
                .not_empty
                .wait_timeout(state, Interrupt::POLL_SLICE)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        self.remove(state)
    }

    fn offer(&self, element: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed || !self.has_room(&state) {
            return Err(element);
        }
        state.buffer.push_back(element);
        drop(state);
        self.not_empty.notify_all();
        Ok(())
    }

    fn poll(&self) -> Option<T> {
        let state = self.lock();
        if state.buffer.is_empty() {
            return None;
        }
        self.remove(state).ok()
    }

    fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        // a deadline past the end of `Instant` means no deadline
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();
        while state.buffer.is_empty() && !state.closed {
            state = match deadline {
                None => self
                    .not_empty
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.not_empty
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        if state.buffer.is_empty() {
            return None;
        }
        self.remove(state).ok()
    }

    fn size(&self) -> usize {
        self.lock().buffer.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn close(&self) {
        self.lock().closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = self.lock().buffer.drain(..).collect();
        if !drained.is_empty() {
            self.not_full.notify_all();
        }
        drained
    }
}
