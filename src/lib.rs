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

//! # addmc
//!
//! A weighted, projected, and exist-random model counter driven by a
//! precomputed join tree, evaluated by composing algebraic decision
//! diagrams bottom-up over the tree.
//!
//! The crate is split the way its CLI and its engine are split: everything
//! here is a library with no knowledge of `std::env`, `clap`, or standard
//! output formatting. [`Executor::run`] is the single entry point a caller
//! (in practice, the `addmc` binary) drives: give it a [`Cnf`], a join-tree
//! source, and a [`RunConfig`], and it returns a [`finalizer::Solution`].

pub mod cnf;
pub mod config;
pub mod diagram;
pub mod error;
pub mod evaluator;
pub mod finalizer;
pub mod ingest;
pub mod jointree;
pub mod numeric;
pub mod profiler;
pub mod scheduler;

use std::io::BufRead;
use std::sync::Arc;

use tracing::info;

pub use cnf::Cnf;
pub use config::{Backend, JoinPriority, RunConfig, RunConfigBuilder};
pub use error::{AddmcError, Result};
pub use finalizer::Solution;
pub use jointree::JoinTree;

/// Wires ingestion, scheduling, and finalization into one call, the way
/// `OptionDict::runCommand` once did — except every step returns a typed
/// `Result` instead of asserting or aborting the process.
pub struct Executor;

impl Executor {
    /// Reads a join tree from `join_tree_stream`, evaluates it against
    /// `cnf` under `config`, and returns the finalized solution.
    pub fn run<R: BufRead>(cnf: Cnf, join_tree_stream: R, config: RunConfig) -> Result<Solution> {
        let config = config.normalize_and_validate()?;

        if cnf.has_empty_clause() {
            info!("cnf contains an empty clause; short-circuiting to unsat");
            let tree = JoinTree {
                nodes: Vec::new(),
                root: 0,
                declared_width: 0,
            };
            return Ok(finalizer::finalize(&cnf, &tree, &config, numeric::Number::zero_rational(), None));
        }

        let processor = ingest::JoinTreeProcessor::new(config.planner_wait_seconds);
        let tree = processor.run(join_tree_stream)?;

        let cnf = Arc::new(cnf);
        let tree = Arc::new(tree);
        let config = Arc::new(config);

        let schedule = scheduler::run_schedule(Arc::clone(&cnf), Arc::clone(&tree), Arc::clone(&config))?;

        Ok(finalizer::finalize(
            &cnf,
            &tree,
            &config,
            schedule.apparent_solution,
            schedule.best_slice,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Cursor;

    fn cnf_with(clauses: Vec<Vec<i64>>, var_count: usize) -> Cnf {
        Cnf {
            declared_var_count: var_count,
            clauses: clauses
                .into_iter()
                .map(|c| c.into_iter().map(cnf::Literal).collect())
                .collect(),
            literal_weights: Default::default(),
            outer_vars: BTreeSet::new(),
            weighted: false,
        }
    }

    #[test]
    fn end_to_end_tautology_counts_two() {
        let cnf = cnf_with(vec![vec![1, -1]], 1);
        let join_tree = "p jt 1 1 2\n2 1 e 1\n=\n";
        let config = RunConfigBuilder::default().build().unwrap();
        let solution = Executor::run(cnf, Cursor::new(join_tree), config).unwrap();
        assert_eq!(solution.satisfiability, finalizer::Satisfiability::Satisfiable);
        assert!((solution.value.to_f64() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn end_to_end_empty_clause_is_unsat_without_reading_a_join_tree() {
        let mut cnf = cnf_with(vec![], 1);
        cnf.clauses.push(vec![]);
        let config = RunConfigBuilder::default().build().unwrap();
        let solution = Executor::run(cnf, Cursor::new(""), config).unwrap();
        assert_eq!(solution.satisfiability, finalizer::Satisfiability::Unsatisfiable);
    }

    #[test]
    fn end_to_end_fails_without_a_join_tree() {
        let cnf = cnf_with(vec![vec![1, -1]], 1);
        let config = RunConfigBuilder::default()
            .planner_wait_seconds(0.01)
            .build()
            .unwrap();
        let err = Executor::run(cnf, Cursor::new(""), config).unwrap_err();
        assert!(matches!(err, AddmcError::NoJoinTree));
    }
}
