// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use taskgang::config::{BarrierKind, GangConfig, QueueVariant};
use taskgang::gang::{Advance, GangState, TaskGang};
use taskgang::gangs::{run_gcd, run_search};
use taskgang::{CycleBarrier, Executor, FailurePolicy, WorkerPool};

fn configs() -> Vec<GangConfig> {
    let mut configs = Vec::new();
    for barrier in [BarrierKind::Countdown, BarrierKind::CompletionQueue] {
        for queue_kind in [QueueVariant::Blocking, QueueVariant::Busy] {
            configs.push(GangConfig {
                workers: 4,
                queue_capacity: 3,
                barrier,
                queue_kind,
                ..GangConfig::default()
            });
        }
    }
    configs
}

/// Every element of a cycle must finish before the next cycle starts.
fn assert_sequential_cycles(barrier: Arc<dyn CycleBarrier>, sizes: &[usize]) {
    let executor: Arc<dyn Executor> = Arc::new(WorkerPool::new(4).unwrap());
    let running_cycle = Arc::new(AtomicU64::new(0));
    let finished_in_cycle = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));

    let batches: Vec<Vec<usize>> = sizes.iter().map(|&n| (0..n).collect()).collect();
    let (r, f, v) = (
        running_cycle.clone(),
        finished_in_cycle.clone(),
        violations.clone(),
    );
    let s = started.clone();
    let sizes_for_hook = sizes.to_vec();
    let mut gang = TaskGang::builder(executor)
        .batches(batches)
        .on_cycle_start(move |start| {
            if start.cycle > 1 {
                let previous = sizes_for_hook[start.cycle as usize - 2];
                if f.swap(0, Ordering::SeqCst) != previous {
                    v.fetch_add(1, Ordering::SeqCst);
                }
            }
            r.store(start.cycle, Ordering::SeqCst);
            s.lock().unwrap().push(start.cycle);
        })
        .processor_with_context({
            let running_cycle = running_cycle.clone();
            let finished_in_cycle = finished_in_cycle.clone();
            let violations = violations.clone();
            move |element: &usize, ctx| {
                if running_cycle.load(Ordering::SeqCst) != ctx.cycle {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_micros((*element as u64 % 4) * 200));
                finished_in_cycle.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .barrier(barrier)
        .advance(Advance::UntilExhausted)
        .build()
        .unwrap();

    let report = gang.run().unwrap();
    assert_eq!(report.cycles, sizes.len() as u64);
    assert_eq!(report.processed, sizes.iter().sum::<usize>());
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(
        *started.lock().unwrap(),
        (1..=sizes.len() as u64).collect::<Vec<_>>()
    );
    assert_eq!(gang.state(), GangState::Done);
}

#[test]
fn test_cycles_are_sequential_for_every_barrier() {
    for config in configs() {
        let barrier = config.make_barrier().unwrap();
        assert_sequential_cycles(barrier, &[5, 3, 7]);
    }
}

#[test]
fn test_search_results_do_not_depend_on_configuration() {
    let batches = vec![
        vec!["xreo".to_string(), "reoxreo".to_string(), "".to_string()],
        vec!["reoreo".to_string()],
    ];
    let expected = run_search(&GangConfig::default(), &["reo"], batches.clone())
        .unwrap()
        .1;
    assert_eq!(expected.len(), 3);

    for config in configs() {
        let (report, results) = run_search(&config, &["reo"], batches.clone()).unwrap();
        assert_eq!(report.cycles, 2, "{config:?}");
        assert_eq!(results, expected, "{config:?}");
    }
}

#[test]
fn test_gcd_gang_with_failure_blocking_policy_finishes() {
    // gcd never fails, so blocking on failure must not change the outcome
    let config = GangConfig {
        failure_policy: FailurePolicy::BlockOnFailure,
        await_timeout_ms: Some(5_000),
        ..GangConfig::default()
    };
    let batches = vec![vec![(48, 36), (35, 14)], vec![(81, 27)], vec![(5, 7)]];
    let (report, results) = run_gcd(&config, batches).unwrap();
    assert_eq!(report.cycles, 3);
    assert_eq!(
        results.iter().map(|r| r.gcd).collect::<Vec<_>>(),
        vec![7, 12, 27, 1]
    );
}

#[test]
fn test_max_cycles_from_config() {
    let config = GangConfig {
        max_cycles: Some(2),
        ..GangConfig::default()
    };
    let batches = vec![vec![(2, 4)], vec![(3, 9)], vec![(5, 25)]];
    let (report, results) = run_gcd(&config, batches).unwrap();
    assert_eq!(report.cycles, 2);
    assert_eq!(results.len(), 2);
}

#[cfg(feature = "stress")]
#[test]
fn test_many_cycles_of_varying_size() {
    let sizes: Vec<usize> = (0..200).map(|i| 1 + (i * 7) % 23).collect();
    for config in configs() {
        assert_sequential_cycles(config.make_barrier().unwrap(), &sizes);
    }
}
