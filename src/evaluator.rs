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

//! The subtree evaluator (§4.4): recursive bottom-up compilation of one join
//! node into an ADD, with weighted projection and, when maximizing, a
//! maximizer-stack trace for argmax reconstruction.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use binary_heap_plus::BinaryHeap;
use compare::Compare;

use crate::cnf::{Cnf, Literal};
use crate::config::{JoinPriority, RunConfig};
use crate::diagram::{DdIndex, Manager};
use crate::jointree::{Assignment, JoinNode, JoinTree};
use crate::numeric::Number;
use crate::profiler::{NodeTimer, Profiler};

/// One entry of the maximizer stack (§3): the dd-variable fixed at a max
/// projection step, and the Boolean-difference diagram deciding its value.
#[derive(Clone)]
pub struct MaximizerEntry {
    pub var: usize,
    pub diagram: DdIndex,
}

/// Per-slice evaluation state: the diagram manager plus whatever the
/// maximizer needs to record along the way. One instance per worker thread
/// (§4.5); never shared.
pub struct Evaluator<'a> {
    cnf: &'a Cnf,
    tree: &'a JoinTree,
    config: &'a RunConfig,
    manager: &'a mut Manager,
    pub maximizer_stack: Vec<MaximizerEntry>,
    profiler: Profiler,
}

/// Orders `(node_count, diagram)` pairs so that `BinaryHeap::pop` — which
/// always returns the comparator's maximum — yields the smallest or the
/// largest diagram first, as `join_priority` demands. The key is snapshotted
/// at insertion time rather than borrowing the manager, so the heap can
/// coexist with later `&mut Manager` calls.
#[derive(Clone, Copy)]
struct ByNodeCount {
    smallest_first: bool,
}

impl Compare<(usize, DdIndex)> for ByNodeCount {
    fn compare(&self, a: &(usize, DdIndex), b: &(usize, DdIndex)) -> Ordering {
        let ord = a.0.cmp(&b.0);
        if self.smallest_first {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(cnf: &'a Cnf, tree: &'a JoinTree, config: &'a RunConfig, manager: &'a mut Manager) -> Self {
        Evaluator {
            cnf,
            tree,
            config,
            manager,
            maximizer_stack: Vec::new(),
            profiler: Profiler::new(config),
        }
    }

    /// The per-variable timing and diagram-size stats accumulated while this
    /// evaluator ran, if profiling was enabled for this run (§4.7).
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Compiles the subtree rooted at `node_index` into a single ADD,
    /// projecting out every variable the node is responsible for. When
    /// profiling is enabled, a nonterminal's visit duration and resulting
    /// diagram size are charged against every variable it projects (§4.7),
    /// the way `dmc.cc`'s `solveSubtree` calls `updateVarDurations`/
    /// `updateVarDdSizes` inline around the same work.
    pub fn solve_subtree(&mut self, node_index: usize, assignment: &Assignment) -> DdIndex {
        match self.tree.node(node_index).expect("node index in range") {
            JoinNode::Terminal { clause_index } => self.build_clause(*clause_index, assignment),
            JoinNode::Nonterminal { children, cnf_vars } => {
                let children = children.clone();
                let cnf_vars = cnf_vars.clone();
                let timer = NodeTimer::start();
                let combined = self.combine_children(&children, assignment);
                let result = self.project_vars(combined, &cnf_vars, assignment);
                let dd_size = self.manager.node_count(result);
                self.profiler.record(&cnf_vars, timer.elapsed(), dd_size);
                result
            }
        }
    }

    /// Builds the ADD for one clause (§4.4 terminal case): a disjunction of
    /// literal ADDs, sliced against `assignment` as it goes.
    fn build_clause(&mut self, clause_index: usize, assignment: &Assignment) -> DdIndex {
        let clause = &self.cnf.clauses[clause_index - 1];
        let log = self.config.uses_log_domain();
        let mut dd = self.manager.zero();

        for &lit in clause {
            let var = lit.var();
            if let Some(&fixed) = assignment.get(&var) {
                let satisfied = fixed == lit.is_positive();
                if satisfied {
                    return self.manager.one();
                }
                continue;
            }
            let weight = self.cnf.literal_weight(lit, log);
            let (low, high) = if lit.is_positive() {
                (self.zero_weight(log), weight)
            } else {
                (weight, self.zero_weight(log))
            };
            let lit_dd = self.manager.var_literal(var, low, high);
            dd = self.manager.max(dd, lit_dd);
        }
        dd
    }

    fn zero_weight(&self, log: bool) -> Number {
        if log {
            Number::zero_log()
        } else {
            Number::zero_rational()
        }
    }

    fn combine_children(&mut self, children: &[usize], assignment: &Assignment) -> DdIndex {
        let child_dds: Vec<DdIndex> = children
            .iter()
            .map(|&c| self.solve_subtree(c, assignment))
            .collect();

        match self.config.join_priority {
            JoinPriority::Arbitrary => {
                let mut iter = child_dds.into_iter();
                let first = iter.next().unwrap_or_else(|| self.manager.one());
                iter.fold(first, |acc, dd| self.manager.product(acc, dd))
            }
            JoinPriority::SmallestPair | JoinPriority::LargestPair => {
                let smallest_first = matches!(self.config.join_priority, JoinPriority::SmallestPair);
                let cmp = ByNodeCount { smallest_first };
                let keyed: Vec<(usize, DdIndex)> = child_dds
                    .into_iter()
                    .map(|dd| (self.manager.node_count(dd), dd))
                    .collect();
                let mut heap: BinaryHeap<(usize, DdIndex), ByNodeCount> =
                    BinaryHeap::from_vec_cmp(keyed, cmp);
                while heap.len() > 1 {
                    let (_, a) = heap.pop().unwrap();
                    let (_, b) = heap.pop().unwrap();
                    let product = self.manager.product(a, b);
                    heap.push((self.manager.node_count(product), product));
                }
                heap.pop()
                    .map(|(_, dd)| dd)
                    .unwrap_or_else(|| self.manager.one())
            }
        }
    }

    /// Projects out every variable in `cnf_vars` from `dd` (§4.4), folding
    /// in literal weights and, when maximizing, recording a maximizer-stack
    /// entry for each variable eliminated by `max`.
    fn project_vars(&mut self, mut dd: DdIndex, cnf_vars: &std::collections::BTreeSet<usize>, assignment: &Assignment) -> DdIndex {
        let log = self.config.uses_log_domain();
        for &v in cnf_vars {
            let additive = self.cnf.outer_vars.contains(&v) ^ self.config.exist_random;
            let w_pos = self.cnf.literal_weight(Literal(v as i64), log);
            let w_neg = self.cnf.literal_weight(Literal(-(v as i64)), log);

            if let Some(&fixed) = assignment.get(&v) {
                let w = if fixed { w_pos } else { w_neg };
                let w_dd = self.manager.constant(w);
                dd = self.manager.product(dd, w_dd);
                continue;
            }

            let low_branch = self.manager.compose(dd, v, false);
            let high_branch = self.manager.compose(dd, v, true);
            let w_neg_dd = self.manager.constant(w_neg);
            let w_pos_dd = self.manager.constant(w_pos);
            let t0 = self.manager.product(low_branch, w_neg_dd);
            let t1 = self.manager.product(high_branch, w_pos_dd);

            if additive {
                dd = self.manager.sum(t0, t1);
            } else {
                if self.config.maximizing_assignment {
                    let diff = self.manager.bool_diff(t1, t0);
                    self.maximizer_stack.push(MaximizerEntry { var: v, diagram: diff });
                }
                dd = self.manager.max(t0, t1);
            }
        }
        dd
    }
}

/// Evaluates every variable not projected anywhere in the tree (§4.6
/// "hidden variables"), folding each one's weight into `value` directly —
/// used by the finalizer, kept here since it shares the additive/max
/// polarity rule with `project_vars`.
pub fn fold_hidden_variable(
    manager: &mut Manager,
    cnf: &Cnf,
    config: &RunConfig,
    value: DdIndex,
    var: usize,
) -> DdIndex {
    let log = config.uses_log_domain();
    let additive = cnf.outer_vars.contains(&var) ^ config.exist_random;
    let w_pos = cnf.literal_weight(Literal(var as i64), log);
    let w_neg = cnf.literal_weight(Literal(-(var as i64)), log);
    let folded = if additive { w_pos.add(&w_neg) } else { w_pos.max(&w_neg) };
    let folded_dd = manager.constant(folded);
    manager.product(value, folded_dd)
}

/// A full boolean assignment over dd-variables, built by replaying the
/// maximizer stack (§4.6 step 5).
pub fn replay_maximizer(manager: &Manager, stack: &[MaximizerEntry]) -> BTreeMap<usize, bool> {
    let mut assignment: std::collections::HashMap<usize, bool> = std::collections::HashMap::new();
    for entry in stack.iter().rev() {
        let value = manager
            .eval_assignment(entry.diagram, &assignment)
            .map(|n| n.to_f64() != 0.0)
            .unwrap_or(false);
        assignment.insert(entry.var, value);
    }
    assignment.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfigBuilder;
    use std::collections::BTreeSet;

    fn cnf_with(clauses: Vec<Vec<i64>>, var_count: usize) -> Cnf {
        Cnf {
            declared_var_count: var_count,
            clauses: clauses
                .into_iter()
                .map(|c| c.into_iter().map(Literal).collect())
                .collect(),
            literal_weights: Default::default(),
            outer_vars: BTreeSet::new(),
            weighted: false,
        }
    }

    fn tree_with_root(nodes: Vec<JoinNode>, root: usize) -> JoinTree {
        JoinTree {
            nodes: nodes.into_iter().map(Some).collect(),
            root,
            declared_width: 0,
        }
    }

    #[test]
    fn tautology_counts_two() {
        let cnf = cnf_with(vec![vec![1, -1]], 1);
        let tree = tree_with_root(
            vec![
                JoinNode::Terminal { clause_index: 1 },
                JoinNode::Nonterminal {
                    children: vec![0],
                    cnf_vars: [1].into_iter().collect(),
                },
            ],
            1,
        );
        let config = RunConfigBuilder::default().build().unwrap();
        let mut manager = Manager::new(false);
        let mut eval = Evaluator::new(&cnf, &tree, &config, &mut manager);
        let dd = eval.solve_subtree(tree.root, &Assignment::new());
        assert_eq!(manager.extract_const(dd).unwrap(), Number::from_f64_rational(2.0));
    }

    #[test]
    fn contradiction_counts_zero() {
        let cnf = cnf_with(vec![vec![1], vec![-1]], 1);
        let tree = tree_with_root(
            vec![
                JoinNode::Terminal { clause_index: 1 },
                JoinNode::Terminal { clause_index: 2 },
                JoinNode::Nonterminal {
                    children: vec![0, 1],
                    cnf_vars: [1].into_iter().collect(),
                },
            ],
            2,
        );
        let config = RunConfigBuilder::default().build().unwrap();
        let mut manager = Manager::new(false);
        let mut eval = Evaluator::new(&cnf, &tree, &config, &mut manager);
        let dd = eval.solve_subtree(tree.root, &Assignment::new());
        assert!(manager.extract_const(dd).unwrap().is_zero());
    }

    #[test]
    fn weighted_single_variable_sums_literal_weights() {
        let mut cnf = cnf_with(vec![vec![1]], 1);
        cnf.literal_weights.insert(1, Number::from_f64_rational(0.3));
        cnf.literal_weights.insert(-1, Number::from_f64_rational(0.7));
        cnf.weighted = true;
        let tree = tree_with_root(
            vec![
                JoinNode::Terminal { clause_index: 1 },
                JoinNode::Nonterminal {
                    children: vec![0],
                    cnf_vars: [1].into_iter().collect(),
                },
            ],
            1,
        );
        let config = RunConfigBuilder::default().weighted_counting(true).build().unwrap();
        let mut manager = Manager::new(false);
        let mut eval = Evaluator::new(&cnf, &tree, &config, &mut manager);
        let dd = eval.solve_subtree(tree.root, &Assignment::new());
        let result = manager.extract_const(dd).unwrap();
        assert!((result.to_f64() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn maximizing_records_a_replayable_stack() {
        let cnf = cnf_with(vec![vec![1, 2], vec![-1, -2]], 2);
        let tree = tree_with_root(
            vec![
                JoinNode::Terminal { clause_index: 1 },
                JoinNode::Terminal { clause_index: 2 },
                JoinNode::Nonterminal {
                    children: vec![0, 1],
                    cnf_vars: [1, 2].into_iter().collect(),
                },
            ],
            2,
        );
        let config = RunConfigBuilder::default()
            .exist_random(true)
            .maximizing_assignment(true)
            .build()
            .unwrap();
        let mut manager = Manager::new(false);
        let mut eval = Evaluator::new(&cnf, &tree, &config, &mut manager);
        let dd = eval.solve_subtree(tree.root, &Assignment::new());
        assert_eq!(eval.maximizer_stack.len(), 2);
        let maximizer_stack = eval.maximizer_stack.clone();
        drop(eval);
        assert!(manager.extract_const(dd).is_ok());

        let assignment = replay_maximizer(&manager, &maximizer_stack);
        assert_eq!(assignment.len(), 2);
    }

    #[test]
    fn profiling_records_duration_and_size_per_projected_variable() {
        let cnf = cnf_with(vec![vec![1, -1]], 1);
        let tree = tree_with_root(
            vec![
                JoinNode::Terminal { clause_index: 1 },
                JoinNode::Nonterminal {
                    children: vec![0],
                    cnf_vars: [1].into_iter().collect(),
                },
            ],
            1,
        );
        let config = RunConfigBuilder::default()
            .verbose_profiling(1i64)
            .thread_count(1usize)
            .build()
            .unwrap();
        let mut manager = Manager::new(false);
        let mut eval = Evaluator::new(&cnf, &tree, &config, &mut manager);
        eval.solve_subtree(tree.root, &Assignment::new());

        let stats = eval.profiler().stats().expect("profiling was requested and single-threaded");
        assert!(stats.contains_key(&1));
        assert!(stats[&1].peak_dd_size > 0);
    }
}
