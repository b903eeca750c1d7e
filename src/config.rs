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

//! The run-scoped configuration (§3, §9). Built once — by the `addmc`
//! binary from parsed CLI options, or directly by a library caller — and
//! threaded by shared reference through every component. No component
//! mutates it once ingestion has started.

use derive_builder::Builder;

use crate::error::{AddmcError, Result};

/// Which diagram backend a run uses. Named after the two packages the
/// original tool could link against, since the CLI surface (`--dd-package`)
/// still uses those names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Rational or log-domain doubles; disallows multiple precision.
    Cudd,
    /// Double precision or multiple-precision rationals; disallows
    /// log-counting.
    Sylvan,
}

/// How sibling child diagrams are combined at a nonterminal join node (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPriority {
    /// Left-fold the children in declaration order.
    Arbitrary,
    /// Repeatedly multiply the two smallest diagrams.
    SmallestPair,
    /// Repeatedly multiply the two largest diagrams.
    LargestPair,
}

/// A signed variable-order heuristic id, matching the original CLI's
/// "negative = inverse" convention (§6). Heuristic `1` orders variables by
/// increasing id; any other positive id falls back to the same order (the
/// original tool's MCS-style heuristics are out of scope here — see
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarOrderHeuristic(pub i64);

impl VarOrderHeuristic {
    pub fn inverse(self) -> bool {
        self.0 < 0
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct RunConfig {
    #[builder(default = "false")]
    pub weighted_counting: bool,
    #[builder(default = "false")]
    pub projected_counting: bool,
    #[builder(default = "false")]
    pub exist_random: bool,
    #[builder(default = "false")]
    pub maximizing_assignment: bool,

    #[builder(default = "10.0")]
    pub planner_wait_seconds: f64,

    #[builder(default = "Backend::Cudd")]
    pub dd_package: Backend,

    #[builder(default = "1")]
    pub thread_count: usize,
    #[builder(default = "1")]
    pub thread_slice_count: usize,

    #[builder(default = "0")]
    pub random_seed: i64,

    #[builder(default = "VarOrderHeuristic(1)")]
    pub dd_var_order: VarOrderHeuristic,
    #[builder(default = "VarOrderHeuristic(1)")]
    pub slice_var_order: VarOrderHeuristic,

    #[builder(default = "1e3")]
    pub mem_sensitivity_mb: f64,
    #[builder(default = "4e3")]
    pub max_mem_mb: f64,

    #[builder(default = "1")]
    pub table_ratio: i64,
    #[builder(default = "10")]
    pub init_ratio: i64,

    #[builder(default = "false")]
    pub multiple_precision: bool,
    #[builder(default = "false")]
    pub log_counting: bool,

    #[builder(default = "JoinPriority::SmallestPair")]
    pub join_priority: JoinPriority,

    #[builder(default = "0")]
    pub verbose_cnf: i64,
    #[builder(default = "0")]
    pub verbose_join_tree: i64,
    #[builder(default = "0")]
    pub verbose_profiling: i64,
    #[builder(default = "1")]
    pub verbose_solving: i64,
}

/// The minimum planner-wait duration the CLI falls back to when the user
/// supplies a non-positive value (§6).
pub const MIN_PLANNER_WAIT_SECONDS: f64 = 2.0;

impl RunConfig {
    /// Resolves `thread_count == 0` to the number of logical CPUs, and a
    /// non-positive `planner_wait_seconds` to the default minimum, then
    /// checks the forbidden mode combinations from §7 (`SemanticError`).
    pub fn normalize_and_validate(mut self) -> Result<Self> {
        if self.thread_count == 0 {
            self.thread_count = num_cpus::get();
        }
        if self.planner_wait_seconds <= 0.0 {
            self.planner_wait_seconds = MIN_PLANNER_WAIT_SECONDS;
        }

        if self.maximizing_assignment && !self.exist_random {
            return Err(AddmcError::Semantic(
                "maximizing_assignment requires exist_random".into(),
            ));
        }
        if self.log_counting && self.dd_package != Backend::Cudd {
            return Err(AddmcError::Semantic(
                "log_counting requires the cudd-style backend".into(),
            ));
        }
        if self.multiple_precision && self.dd_package != Backend::Sylvan {
            return Err(AddmcError::Semantic(
                "multiple_precision requires the sylvan-style backend".into(),
            ));
        }
        if self.log_counting && self.multiple_precision {
            return Err(AddmcError::Semantic(
                "log_counting and multiple_precision are mutually exclusive".into(),
            ));
        }
        if self.thread_slice_count == 0 {
            return Err(AddmcError::Semantic(
                "thread_slice_count must be positive".into(),
            ));
        }
        Ok(self)
    }

    /// Whether the active backend represents numbers in the log domain.
    pub fn uses_log_domain(&self) -> bool {
        self.log_counting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximizing_without_exist_random_is_rejected() {
        let cfg = RunConfigBuilder::default()
            .maximizing_assignment(true)
            .exist_random(false)
            .build()
            .unwrap();
        assert!(matches!(
            cfg.normalize_and_validate(),
            Err(AddmcError::Semantic(_))
        ));
    }

    #[test]
    fn log_counting_with_sylvan_backend_is_rejected() {
        let cfg = RunConfigBuilder::default()
            .log_counting(true)
            .dd_package(Backend::Sylvan)
            .build()
            .unwrap();
        assert!(matches!(
            cfg.normalize_and_validate(),
            Err(AddmcError::Semantic(_))
        ));
    }

    #[test]
    fn multiple_precision_with_cudd_backend_is_rejected() {
        let cfg = RunConfigBuilder::default()
            .multiple_precision(true)
            .dd_package(Backend::Cudd)
            .build()
            .unwrap();
        assert!(matches!(
            cfg.normalize_and_validate(),
            Err(AddmcError::Semantic(_))
        ));
    }

    #[test]
    fn zero_thread_count_resolves_to_hardware_concurrency() {
        let cfg = RunConfigBuilder::default()
            .thread_count(0usize)
            .build()
            .unwrap()
            .normalize_and_validate()
            .unwrap();
        assert_eq!(cfg.thread_count, num_cpus::get());
    }

    #[test]
    fn nonpositive_planner_wait_falls_back_to_minimum() {
        let cfg = RunConfigBuilder::default()
            .planner_wait_seconds(-1.0)
            .build()
            .unwrap()
            .normalize_and_validate()
            .unwrap();
        assert_eq!(cfg.planner_wait_seconds, MIN_PLANNER_WAIT_SECONDS);
    }
}
