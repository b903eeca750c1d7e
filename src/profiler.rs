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

//! Per-variable profiling (§4.7): cumulative wall time and peak diagram
//! size, attributed to every variable a join node's pre-projection set
//! names. Gated to single-threaded runs, matching the single-writer
//! invariant of §5 — the evaluator is the only writer, so sharing this
//! across worker threads would race.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::RunConfig;

#[derive(Debug, Default)]
pub struct VarStats {
    pub cumulative_duration: Duration,
    pub peak_dd_size: usize,
}

/// Accumulates `VarStats` across the nodes visited during one evaluation.
/// `None` when profiling is disabled, so call sites stay branch-free.
pub struct Profiler {
    stats: Option<HashMap<usize, VarStats>>,
}

impl Profiler {
    /// Enables profiling only when requested and the run is single-threaded;
    /// otherwise warns and returns a no-op profiler.
    pub fn new(config: &RunConfig) -> Self {
        if config.verbose_profiling < 1 {
            return Profiler { stats: None };
        }
        if config.thread_count > 1 {
            warn!(
                thread_count = config.thread_count,
                "profiling requires thread_count == 1; disabling for this run"
            );
            return Profiler { stats: None };
        }
        Profiler {
            stats: Some(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.stats.is_some()
    }

    /// Records one node's visit duration and resulting diagram size against
    /// every variable in `pre_projection_vars`.
    pub fn record(&mut self, pre_projection_vars: &std::collections::BTreeSet<usize>, duration: Duration, dd_size: usize) {
        let Some(stats) = self.stats.as_mut() else {
            return;
        };
        for &var in pre_projection_vars {
            let entry = stats.entry(var).or_default();
            entry.cumulative_duration += duration;
            entry.peak_dd_size = entry.peak_dd_size.max(dd_size);
        }
    }

    pub fn stats(&self) -> Option<&HashMap<usize, VarStats>> {
        self.stats.as_ref()
    }
}

/// A convenience timer for bracketing one node visit: `start()` before
/// evaluating a node, `elapsed()` (or drop) to recover the duration.
pub struct NodeTimer {
    started: Instant,
}

impl NodeTimer {
    pub fn start() -> Self {
        NodeTimer { started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfigBuilder;

    #[test]
    fn disabled_when_verbosity_is_zero() {
        let config = RunConfigBuilder::default().build().unwrap();
        let profiler = Profiler::new(&config);
        assert!(!profiler.is_enabled());
    }

    #[test]
    fn disabled_when_multithreaded_even_if_requested() {
        let config = RunConfigBuilder::default()
            .verbose_profiling(1i64)
            .thread_count(4usize)
            .build()
            .unwrap();
        let profiler = Profiler::new(&config);
        assert!(!profiler.is_enabled());
    }

    #[test]
    fn accumulates_duration_and_peak_size_per_variable() {
        let config = RunConfigBuilder::default()
            .verbose_profiling(1i64)
            .thread_count(1usize)
            .build()
            .unwrap();
        let mut profiler = Profiler::new(&config);
        assert!(profiler.is_enabled());

        let vars = [1, 2].into_iter().collect();
        profiler.record(&vars, Duration::from_millis(5), 10);
        profiler.record(&vars, Duration::from_millis(3), 20);

        let stats = profiler.stats().unwrap();
        assert_eq!(stats[&1].peak_dd_size, 20);
        assert_eq!(stats[&1].cumulative_duration, Duration::from_millis(8));
    }
}
