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

//! The finalizer (§4.6): folds hidden-variable weights into the scheduler's
//! apparent solution, classifies satisfiability, and — when maximizing —
//! replays the winning slice's maximizer stack into a CNF-variable
//! assignment.

use std::collections::BTreeMap;

use crate::cnf::Cnf;
use crate::config::RunConfig;
use crate::diagram::Manager;
use crate::evaluator::{fold_hidden_variable, replay_maximizer, MaximizerEntry};
use crate::jointree::JoinTree;
use crate::numeric::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfiability {
    Satisfiable,
    Unsatisfiable,
    Unknown,
}

/// The type tag emitted on the `s type` row: plain model count, weighted
/// model count, or the existential-random/maximizing "probabilistic" form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionType {
    ModelCount,
    WeightedModelCount,
    ProbabilisticModelCount,
}

#[derive(Debug)]
pub struct Solution {
    pub satisfiability: Satisfiability,
    pub solution_type: SolutionType,
    pub log10_estimate: f64,
    pub value: Number,
    pub assignment: Option<Vec<i64>>,
}

/// Folds every variable that never appeared in a clause into `value`
/// (§4.6 step 1-2), in ascending variable-id order for determinism.
fn fold_hidden_variables(manager: &mut Manager, cnf: &Cnf, config: &RunConfig, mut value: Number) -> Number {
    let apparent = cnf.apparent_vars();
    let hidden: Vec<usize> = (1..=cnf.declared_var_count)
        .filter(|v| !apparent.contains(v))
        .collect();
    if hidden.is_empty() {
        return value;
    }
    let value_dd = manager.constant(value.clone());
    let mut dd = value_dd;
    for v in hidden {
        dd = fold_hidden_variable(manager, cnf, config, dd, v);
    }
    value = manager
        .extract_const(dd)
        .expect("folding constants never introduces a free variable");
    value
}

/// The type tag is a run-mode property, not a structural one: it follows
/// `config.projected_counting`/`config.weighted_counting`, matching
/// `dmc.cc`'s `printTypeRow` (`projectedCounting ? "pmc" : (weightedCounting
/// ? "wmc" : "mc")`), which branches on the same CLI flags regardless of
/// what the CNF itself declares.
fn solution_type(config: &RunConfig) -> SolutionType {
    if config.projected_counting {
        SolutionType::ProbabilisticModelCount
    } else if config.weighted_counting {
        SolutionType::WeightedModelCount
    } else {
        SolutionType::ModelCount
    }
}

/// Produces the final `Solution` from the scheduler's apparent total and
/// (optionally) the manager/stack belonging to the winning slice.
pub fn finalize(
    cnf: &Cnf,
    tree: &JoinTree,
    config: &RunConfig,
    apparent_value: Number,
    best_slice: Option<(Manager, Vec<MaximizerEntry>)>,
) -> Solution {
    if cnf.has_empty_clause() {
        return Solution {
            satisfiability: Satisfiability::Unsatisfiable,
            solution_type: solution_type(config),
            log10_estimate: f64::NEG_INFINITY,
            value: if config.uses_log_domain() {
                Number::zero_log()
            } else {
                Number::zero_rational()
            },
            assignment: None,
        };
    }

    let (value, assignment) = match best_slice {
        Some((mut manager, stack)) => {
            let folded = fold_hidden_variables(&mut manager, cnf, config, apparent_value);
            let assignment = if config.maximizing_assignment {
                let by_dd_var = replay_maximizer(&manager, &stack);
                Some(render_assignment(tree, &by_dd_var))
            } else {
                None
            };
            (folded, assignment)
        }
        None => {
            let mut manager = Manager::new(config.uses_log_domain());
            (fold_hidden_variables(&mut manager, cnf, config, apparent_value), None)
        }
    };

    let satisfiability = if value.is_zero() && !config.weighted_counting {
        Satisfiability::Unsatisfiable
    } else {
        Satisfiability::Satisfiable
    };

    Solution {
        satisfiability,
        solution_type: solution_type(config),
        log10_estimate: value.log10(),
        value,
        assignment,
    }
}

/// Translates a dd-var -> bool map into the `v` row's signed literal list,
/// covering every declared variable (unassigned variables default false,
/// matching the original tool's "omitted means don't-care" convention).
fn render_assignment(tree: &JoinTree, by_var: &BTreeMap<usize, bool>) -> Vec<i64> {
    let all_vars = tree.pre_projection_vars();
    all_vars
        .into_iter()
        .map(|v| {
            let truth = by_var.get(&v).copied().unwrap_or(false);
            if truth {
                v as i64
            } else {
                -(v as i64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn empty_cnf(declared_var_count: usize) -> Cnf {
        Cnf {
            declared_var_count,
            clauses: vec![vec![]],
            literal_weights: Default::default(),
            outer_vars: BTreeSet::new(),
            weighted: false,
        }
    }

    #[test]
    fn empty_clause_is_unsatisfiable() {
        let cnf = empty_cnf(1);
        let tree = JoinTree {
            nodes: vec![],
            root: 0,
            declared_width: 0,
        };
        let config = crate::config::RunConfigBuilder::default().build().unwrap();
        let solution = finalize(&cnf, &tree, &config, Number::zero_rational(), None);
        assert_eq!(solution.satisfiability, Satisfiability::Unsatisfiable);
    }

    #[test]
    fn zero_value_unweighted_is_unsatisfiable() {
        let cnf = Cnf {
            declared_var_count: 1,
            clauses: vec![vec![crate::cnf::Literal(1)]],
            literal_weights: Default::default(),
            outer_vars: BTreeSet::new(),
            weighted: false,
        };
        let tree = JoinTree {
            nodes: vec![],
            root: 0,
            declared_width: 0,
        };
        let config = crate::config::RunConfigBuilder::default().build().unwrap();
        let solution = finalize(&cnf, &tree, &config, Number::zero_rational(), None);
        assert_eq!(solution.satisfiability, Satisfiability::Unsatisfiable);
    }

    #[test]
    fn nonzero_value_is_satisfiable() {
        let cnf = Cnf {
            declared_var_count: 1,
            clauses: vec![vec![crate::cnf::Literal(1)]],
            literal_weights: Default::default(),
            outer_vars: BTreeSet::new(),
            weighted: false,
        };
        let tree = JoinTree {
            nodes: vec![],
            root: 0,
            declared_width: 0,
        };
        let config = crate::config::RunConfigBuilder::default().build().unwrap();
        let solution = finalize(&cnf, &tree, &config, Number::from_f64_rational(2.0), None);
        assert_eq!(solution.satisfiability, Satisfiability::Satisfiable);
        assert!((solution.value.to_f64() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn solution_type_and_satisfiability_follow_config_not_cnf_structure() {
        // cnf.weighted is true but config.weighted_counting is false: the
        // type tag and the unsat rule must both follow the run-mode flag.
        let mut cnf = Cnf {
            declared_var_count: 1,
            clauses: vec![vec![crate::cnf::Literal(1)]],
            literal_weights: Default::default(),
            outer_vars: BTreeSet::new(),
            weighted: true,
        };
        cnf.literal_weights.insert(1, Number::zero_rational());
        let tree = JoinTree {
            nodes: vec![],
            root: 0,
            declared_width: 0,
        };
        let config = crate::config::RunConfigBuilder::default()
            .weighted_counting(false)
            .build()
            .unwrap();
        let solution = finalize(&cnf, &tree, &config, Number::zero_rational(), None);
        assert_eq!(solution.solution_type, SolutionType::ModelCount);
        assert_eq!(solution.satisfiability, Satisfiability::Unsatisfiable);
    }
}
