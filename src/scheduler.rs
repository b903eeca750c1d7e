// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The slice scheduler (§4.5): partitions outer-variable assignments into
//! `2^S` slices, runs one `Evaluator` per worker thread with its own
//! diagram manager, and folds partial solutions into one accumulator under
//! a single mutex — mirroring the teacher's parallel branch-and-bound
//! driver's shared-state shape without sharing any diagram state itself.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cnf::Cnf;
use crate::config::RunConfig;
use crate::diagram::Manager;
use crate::error::Result;
use crate::evaluator::{Evaluator, MaximizerEntry};
use crate::jointree::{Assignment, JoinTree};
use crate::numeric::Number;

/// What the scheduler hands back to the finalizer: the combined apparent
/// solution, plus (when maximizing) the manager and maximizer stack that
/// produced the best partial result, so the caller can replay it.
pub struct ScheduleResult {
    pub apparent_solution: Number,
    pub best_slice: Option<(Manager, Vec<MaximizerEntry>)>,
}

struct Accumulator {
    total: Number,
    best: Option<(Number, Manager, Vec<MaximizerEntry>)>,
}

/// Computes `S = min(|outerVars|, ceil(log2(T*K)))` and the assignments it
/// implies, per §4.5.
fn slice_variables(cnf: &Cnf, config: &RunConfig) -> Vec<usize> {
    let t = config.thread_count.max(1) as f64;
    let k = config.thread_slice_count.max(1) as f64;
    let max_slices = ((t * k).log2()).ceil().max(0.0) as usize;
    let s = max_slices.min(cnf.outer_vars.len());
    cnf.outer_vars.iter().copied().take(s).collect()
}

fn enumerate_assignments(vars: &[usize]) -> Vec<Assignment> {
    let count = 1usize << vars.len();
    (0..count)
        .map(|mask| {
            vars.iter()
                .enumerate()
                .map(|(i, &v)| (v, (mask >> i) & 1 == 1))
                .collect()
        })
        .collect()
}

/// Splits `total` items into `buckets` groups, each sized by ceiling
/// division of what remains — thread 0 gets the largest batch (§4.5).
fn bucket_sizes(total: usize, buckets: usize) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(buckets);
    let mut remaining_items = total;
    let mut remaining_buckets = buckets;
    while remaining_buckets > 0 {
        let size = (remaining_items + remaining_buckets - 1) / remaining_buckets;
        sizes.push(size);
        remaining_items -= size;
        remaining_buckets -= 1;
    }
    sizes
}

fn evaluate_bucket(
    cnf: &Cnf,
    tree: &JoinTree,
    config: &RunConfig,
    assignments: &[Assignment],
) -> (Number, Manager, Vec<MaximizerEntry>) {
    let mut manager = Manager::new(config.uses_log_domain());
    let mut total = if config.uses_log_domain() {
        Number::zero_log()
    } else {
        Number::zero_rational()
    };
    let mut best: Option<(Number, Vec<MaximizerEntry>)> = None;

    for assignment in assignments {
        let mut evaluator = Evaluator::new(cnf, tree, config, &mut manager);
        let dd = evaluator.solve_subtree(tree.root, assignment);
        let stack = std::mem::take(&mut evaluator.maximizer_stack);

        if let Some(stats) = evaluator.profiler().stats() {
            for (&var, s) in stats {
                debug!(
                    var,
                    duration_ms = s.cumulative_duration.as_secs_f64() * 1000.0,
                    peak_dd_size = s.peak_dd_size,
                    "profiled variable"
                );
            }
        }
        drop(evaluator);

        let value = manager
            .extract_const(dd)
            .expect("root evaluation must yield a constant diagram");

        if config.maximizing_assignment {
            let is_better = match &best {
                Some((best_value, _)) => value.ge(best_value),
                None => true,
            };
            if is_better {
                best = Some((value.clone(), stack));
            }
        }
        total = total.add(&value);
    }

    let stack = best.map(|(_, s)| s).unwrap_or_default();
    (total, manager, stack)
}

/// Runs the full schedule: builds the slice list, distributes it across
/// `config.thread_count` workers (the main thread drives the last bucket
/// inline), and combines partial solutions under one mutex.
pub fn run_schedule(cnf: Arc<Cnf>, tree: Arc<JoinTree>, config: Arc<RunConfig>) -> Result<ScheduleResult> {
    let slice_vars = slice_variables(&cnf, &config);
    let assignments = enumerate_assignments(&slice_vars);
    info!(slices = assignments.len(), threads = config.thread_count, "scheduling slices");

    let sizes = bucket_sizes(assignments.len(), config.thread_count);
    let mut buckets = Vec::with_capacity(sizes.len());
    let mut rest = &assignments[..];
    for size in &sizes {
        let (chunk, tail) = rest.split_at(*size);
        buckets.push(chunk.to_vec());
        rest = tail;
    }

    let accumulator = Arc::new(Mutex::new(Accumulator {
        total: if config.uses_log_domain() {
            Number::zero_log()
        } else {
            Number::zero_rational()
        },
        best: None,
    }));

    let last_bucket = buckets.pop();
    let mut handles = Vec::new();
    for bucket in buckets {
        let cnf = Arc::clone(&cnf);
        let tree = Arc::clone(&tree);
        let config = Arc::clone(&config);
        let accumulator = Arc::clone(&accumulator);
        handles.push(std::thread::spawn(move || {
            let (value, manager, stack) = evaluate_bucket(&cnf, &tree, &config, &bucket);
            merge_into(&accumulator, value, manager, stack, &config);
        }));
    }

    if let Some(bucket) = last_bucket {
        let (value, manager, stack) = evaluate_bucket(&cnf, &tree, &config, &bucket);
        merge_into(&accumulator, value, manager, stack, &config);
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| crate::error::AddmcError::Backend("worker thread panicked".into()))?;
    }

    let final_state = Arc::try_unwrap(accumulator)
        .unwrap_or_else(|_| panic!("no outstanding references after joining all worker threads"))
        .into_inner();

    Ok(ScheduleResult {
        apparent_solution: final_state.total,
        best_slice: final_state.best.map(|(_, m, s)| (m, s)),
    })
}

fn merge_into(
    accumulator: &Arc<Mutex<Accumulator>>,
    value: Number,
    manager: Manager,
    stack: Vec<MaximizerEntry>,
    config: &RunConfig,
) {
    let mut guard = accumulator.lock();
    guard.total = guard.total.add(&value);
    if config.maximizing_assignment {
        let is_better = match &guard.best {
            Some((best_value, _, _)) => value.ge(best_value),
            None => true,
        };
        if is_better {
            guard.best = Some((value, manager, stack));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_sizes_sum_to_total_and_decrease() {
        let sizes = bucket_sizes(10, 3);
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn bucket_sizes_handles_more_buckets_than_items() {
        let sizes = bucket_sizes(1, 4);
        assert_eq!(sizes, vec![1, 0, 0, 0]);
    }

    #[test]
    fn enumerate_assignments_produces_one_empty_assignment_for_zero_vars() {
        let assignments = enumerate_assignments(&[]);
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].is_empty());
    }

    #[test]
    fn enumerate_assignments_covers_every_combination() {
        let assignments = enumerate_assignments(&[1, 2]);
        assert_eq!(assignments.len(), 4);
    }
}
