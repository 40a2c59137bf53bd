// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bounded_queue::{QueueError, QueueKind};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::barrier::{CompletionQueueBarrier, CountdownBarrier, CycleBarrier, FailurePolicy};
use crate::executor::{ExecutorError, WorkerPool};
use crate::gang::Advance;

/// Which bounded queue implementation to use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum QueueVariant {
    /// Waiters sleep on a condition variable
    #[default]
    Blocking,
    /// Waiters spin and yield
    Busy,
}

impl From<QueueVariant> for QueueKind {
    fn from(variant: QueueVariant) -> Self {
        match variant {
            QueueVariant::Blocking => QueueKind::Blocking,
            QueueVariant::Busy => QueueKind::Busy,
        }
    }
}

/// How the driver waits for a cycle to finish.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BarrierKind {
    /// Latch counted down by the workers
    #[default]
    Countdown,
    /// Workers report through a bounded queue of completion events
    CompletionQueue,
}

/// Whether the gang keeps pulling batches after the first cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[clap(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum AdvanceMode {
    OneShot,
    #[default]
    UntilExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("workers must be at least 1")]
    NoWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("max-cycles must be at least 1 when set")]
    ZeroMaxCycles,

    #[error("await timeout must be at least 1 ms when set")]
    ZeroTimeout,
}

/// Everything needed to assemble a gang, passed explicitly to whoever builds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GangConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub queue_kind: QueueVariant,
    pub barrier: BarrierKind,
    pub failure_policy: FailurePolicy,
    pub await_timeout_ms: Option<u64>,
    pub advance: AdvanceMode,
    /// Overrides `advance` when set.
    pub max_cycles: Option<u64>,
    pub verbose: bool,
}

impl Default for GangConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            queue_kind: QueueVariant::default(),
            barrier: BarrierKind::default(),
            failure_policy: FailurePolicy::default(),
            await_timeout_ms: None,
            advance: AdvanceMode::default(),
            max_cycles: None,
            verbose: false,
        }
    }
}

impl GangConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: GangConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::ZeroMaxCycles);
        }
        if self.await_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.await_timeout_ms.map(Duration::from_millis)
    }

    pub fn make_pool(&self) -> Result<WorkerPool, ExecutorError> {
        WorkerPool::new(self.workers)
    }

    pub fn make_barrier(&self) -> Result<Arc<dyn CycleBarrier>, QueueError> {
        let barrier: Arc<dyn CycleBarrier> = match (self.barrier, self.timeout()) {
            (BarrierKind::Countdown, None) => Arc::new(CountdownBarrier::new(self.failure_policy)),
            (BarrierKind::Countdown, Some(timeout)) => {
                Arc::new(CountdownBarrier::new(self.failure_policy).with_timeout(timeout))
            }
            (BarrierKind::CompletionQueue, timeout) => {
                let barrier = CompletionQueueBarrier::new(
                    self.queue_kind.into(),
                    self.queue_capacity,
                    self.failure_policy,
                )?;
                match timeout {
                    Some(timeout) => Arc::new(barrier.with_timeout(timeout)),
                    None => Arc::new(barrier),
                }
            }
        };
        Ok(barrier)
    }

    pub fn advance(&self) -> Advance {
        match (self.max_cycles, self.advance) {
            (Some(max), _) => Advance::MaxCycles(max),
            (None, AdvanceMode::OneShot) => Advance::OneShot,
            (None, AdvanceMode::UntilExhausted) => Advance::UntilExhausted,
        }
    }
}
