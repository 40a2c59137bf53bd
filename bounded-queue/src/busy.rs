// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::{BoundedQueue, Interrupt, QueueError};

const SPIN_LIMIT: u32 = 64;

#[derive(Debug)]
struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

enum PutAttempt<T> {
    Inserted,
    Full(T),
    Closed(T),
}

enum TakeAttempt<T> {
    Taken(T),
    Empty,
    Closed,
}

/// Spin a little, then start yielding the time slice.
#[derive(Default)]
struct Backoff {
    step: u32,
}

impl Backoff {
    fn snooze(&mut self) {
        if self.step < SPIN_LIMIT {
            self.step += 1;
            std::hint::spin_loop();
        } else {
            thread::yield_now();
        }
    }
}

/// Bounded queue whose waiters spin instead of sleeping.
///
/// Every operation is a short critical section on one mutex. The blocking
/// calls retry the non-blocking path with a spin-then-yield backoff, so a
/// waiting thread keeps a core busy but never misses a state change.
#[derive(Debug)]
pub struct BusyQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
}

impl<T: Send> BusyQueue<T> {
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
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_put(&self, element: T) -> PutAttempt<T> {
        let mut state = self.lock();
        if state.closed {
            PutAttempt::Closed(element)
        } else if state.buffer.len() >= self.capacity {
            PutAttempt::Full(element)
        } else {
            state.buffer.push_back(element);
            PutAttempt::Inserted
        }
    }

    fn try_take(&self) -> TakeAttempt<T> {
        let mut state = self.lock();
        match state.buffer.pop_front() {
            Some(element) => TakeAttempt::Taken(element),
            None if state.closed => TakeAttempt::Closed,
            None => TakeAttempt::Empty,
        }
    }

    fn spin_put(&self, mut element: T, interrupt: Option<&Interrupt>) -> Result<(), QueueError> {
        let mut backoff = Backoff::default();
        loop {
            match self.try_put(element) {
                PutAttempt::Inserted => return Ok(()),
                PutAttempt::Closed(_) => return Err(QueueError::Closed),
                PutAttempt::Full(back) => element = back,
            }
            if interrupt.is_some_and(Interrupt::is_raised) {
                return Err(QueueError::Interrupted);
            }
            backoff.snooze();
        }
    }

    fn spin_take(&self, interrupt: Option<&Interrupt>) -> Result<T, QueueError> {
        let mut backoff = Backoff::default();
        loop {
            match self.try_take() {
                TakeAttempt::Taken(element) => return Ok(element),
                TakeAttempt::Closed => return Err(QueueError::Closed),
                TakeAttempt::Empty => {}
            }
            if interrupt.is_some_and(Interrupt::is_raised) {
                return Err(QueueError::Interrupted);
            }
            backoff.snooze();
        }
    }
}

impl<T: Send> BoundedQueue<T> for BusyQueue<T> {
    fn put(&self, element: T) -> Result<(), QueueError> {
        self.spin_put(element, None)
    }

    fn put_interruptibly(&self, element: T, interrupt: &Interrupt) -> Result<(), QueueError> {
        self.spin_put(element, Some(interrupt))
    }

    fn take(&self) -> Result<T, QueueError> {
        self.spin_take(None)
    }

    fn take_interruptibly(&self, interrupt: &Interrupt) -> Result<T, QueueError> {
        self.spin_take(Some(interrupt))
    }

    fn offer(&self, element: T) -> Result<(), T> {
        match self.try_put(element) {
            PutAttempt::Inserted => Ok(()),
            PutAttempt::Full(element) | PutAttempt::Closed(element) => Err(element),
        }
    }

    fn poll(&self) -> Option<T> {
        match self.try_take() {
            TakeAttempt::Taken(element) => Some(element),
            TakeAttempt::Empty | TakeAttempt::Closed => None,
        }
    }

    fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut backoff = Backoff::default();
        loop {
            match self.try_take() {
                TakeAttempt::Taken(element) => return Some(element),
                TakeAttempt::Closed => return None,
                TakeAttempt::Empty if deadline.is_some_and(|d| Instant::now() >= d) => {
                    return None
                }
                TakeAttempt::Empty => backoff.snooze(),
            }
        }
    }

    fn size(&self) -> usize {
        self.lock().buffer.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn close(&self) {
        self.lock().closed = true;
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn drain(&self) -> Vec<T> {
        self.lock().buffer.drain(..).collect()
    }
}
