// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::config::GangConfig;
use crate::executor::Executor;
use crate::gang::{GangReport, TaskGang};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GcdResult {
    pub cycle: u64,
    pub a: u64,
    pub b: u64,
    pub gcd: u64,
}

/// Euclid's algorithm. `gcd(0, 0)` is 0.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// `cycles` batches of `pairs` random operand pairs in `1..=max`.
pub fn random_batches(
    rng: &mut fastrand::Rng,
    cycles: usize,
    pairs: usize,
    max: u64,
) -> Vec<Vec<(u64, u64)>> {
    (0..cycles)
        .map(|_| {
            (0..pairs)
                .map(|_| (rng.u64(1..=max), rng.u64(1..=max)))
                .collect()
        })
        .collect()
}

/// Compute the gcd of every pair, one cycle per batch.
///
/// Results are returned ordered by cycle and operands.
pub fn run_gcd(
    config: &GangConfig,
    batches: Vec<Vec<(u64, u64)>>,
) -> anyhow::Result<(GangReport, Vec<GcdResult>)> {
    config.validate()?;
    let results = Arc::new(Mutex::new(Vec::new()));

    let sink = results.clone();
    let executor: Arc<dyn Executor> = Arc::new(config.make_pool()?);
    let mut gang = TaskGang::builder(executor)
        .batches(batches)
        .processor_with_context(move |&(a, b): &(u64, u64), ctx| {
            let result = GcdResult {
                cycle: ctx.cycle,
                a,
                b,
                gcd: gcd(a, b),
            };
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(result);
            Ok(())
        })
        .barrier(config.make_barrier()?)
        .advance(config.advance())
        .build()?;

    let report = gang.run()?;
    drop(gang);

    let mut results =
        std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
    results.sort_by_key(|r| (r.cycle, r.a, r.b));
    Ok((report, results))
}
