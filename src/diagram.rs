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

//! The algebraic decision diagram adapter (§4.2): a hash-consed, reduced,
//! ordered ADD arena plus the operations the evaluator and finalizer drive
//! it through. There is no FFI here — both the original tool's backends are
//! re-expressed as one Rust data structure, parameterized only by the
//! numeric domain (§4.1) in use for the run.

use std::collections::HashMap;
use std::fmt;

use crate::error::{AddmcError, Result};
use crate::numeric::{Number, NumKey};

/// An index into a `Manager`'s node arena. Cheap to copy, compare, and hash;
/// the arena is the only owner of the actual node data.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DdIndex(usize);

#[derive(Debug, Clone)]
enum Node {
    Terminal(Number),
    Branch { var: usize, low: DdIndex, high: DdIndex },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OpTag {
    Product,
    Sum,
    Max,
}

/// Owns every node ever built for one evaluation (one thread's slice, in the
/// scheduler). Nodes are immutable once created; `apply`/`compose` share
/// structure through the unique and terminal tables rather than copying.
pub struct Manager {
    nodes: Vec<Node>,
    unique: HashMap<(usize, DdIndex, DdIndex), DdIndex>,
    terminals: HashMap<NumKey, DdIndex>,
    apply_cache: HashMap<(DdIndex, DdIndex, OpTag), DdIndex>,
    compose_cache: HashMap<(DdIndex, usize, bool), DdIndex>,
    log_domain: bool,
}

impl Manager {
    pub fn new(log_domain: bool) -> Self {
        Manager {
            nodes: Vec::new(),
            unique: HashMap::new(),
            terminals: HashMap::new(),
            apply_cache: HashMap::new(),
            compose_cache: HashMap::new(),
            log_domain,
        }
    }

    pub fn log_domain(&self) -> bool {
        self.log_domain
    }

    fn push(&mut self, node: Node) -> DdIndex {
        let idx = DdIndex(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    /// Interns a terminal node for `value`, reusing any existing node with
    /// the same `NumKey`.
    pub fn constant(&mut self, value: Number) -> DdIndex {
        let key = NumKey::from(&value);
        if let Some(&idx) = self.terminals.get(&key) {
            return idx;
        }
        let idx = self.push(Node::Terminal(value));
        self.terminals.insert(key, idx);
        idx
    }

    pub fn zero(&mut self) -> DdIndex {
        if self.log_domain {
            self.constant(Number::zero_log())
        } else {
            self.constant(Number::zero_rational())
        }
    }

    pub fn one(&mut self) -> DdIndex {
        if self.log_domain {
            self.constant(Number::one_log())
        } else {
            self.constant(Number::one_rational())
        }
    }

    /// Builds a node that branches on `var`, taking `high_weight` when the
    /// variable is true and `low_weight` when false (§4.2 `var_literal`).
    pub fn var_literal(&mut self, var: usize, low_weight: Number, high_weight: Number) -> DdIndex {
        let low = self.constant(low_weight);
        let high = self.constant(high_weight);
        self.branch(var, low, high)
    }

    /// Interns a (possibly reducible) branch node. Reduction: a node whose
    /// two children are identical collapses to that child.
    fn branch(&mut self, var: usize, low: DdIndex, high: DdIndex) -> DdIndex {
        if low == high {
            return low;
        }
        let key = (var, low, high);
        if let Some(&idx) = self.unique.get(&key) {
            return idx;
        }
        let idx = self.push(Node::Branch { var, low, high });
        self.unique.insert(key, idx);
        idx
    }

    fn var_of(&self, idx: DdIndex) -> Option<usize> {
        match &self.nodes[idx.0] {
            Node::Terminal(_) => None,
            Node::Branch { var, .. } => Some(*var),
        }
    }

    fn children(&self, idx: DdIndex, var: usize) -> (DdIndex, DdIndex) {
        match &self.nodes[idx.0] {
            Node::Terminal(_) => (idx, idx),
            Node::Branch { var: v, low, high } => {
                if *v == var {
                    (*low, *high)
                } else {
                    (idx, idx)
                }
            }
        }
    }

    fn apply(&mut self, a: DdIndex, b: DdIndex, op: OpTag) -> DdIndex {
        if let Some(&idx) = self.apply_cache.get(&(a, b, op)) {
            return idx;
        }
        let result = match (&self.nodes[a.0], &self.nodes[b.0]) {
            (Node::Terminal(x), Node::Terminal(y)) => {
                let combined = match op {
                    OpTag::Product => x.mul(y),
                    OpTag::Sum => x.add(y),
                    OpTag::Max => x.max(y),
                };
                self.constant(combined)
            }
            _ => {
                let top = match (self.var_of(a), self.var_of(b)) {
                    (Some(va), Some(vb)) => va.min(vb),
                    (Some(va), None) => va,
                    (None, Some(vb)) => vb,
                    (None, None) => unreachable!("terminal/terminal case handled above"),
                };
                let (a_low, a_high) = self.children(a, top);
                let (b_low, b_high) = self.children(b, top);
                let low = self.apply(a_low, b_low, op);
                let high = self.apply(a_high, b_high, op);
                self.branch(top, low, high)
            }
        };
        self.apply_cache.insert((a, b, op), result);
        result
    }

    pub fn product(&mut self, a: DdIndex, b: DdIndex) -> DdIndex {
        self.apply(a, b, OpTag::Product)
    }

    pub fn sum(&mut self, a: DdIndex, b: DdIndex) -> DdIndex {
        self.apply(a, b, OpTag::Sum)
    }

    pub fn max(&mut self, a: DdIndex, b: DdIndex) -> DdIndex {
        self.apply(a, b, OpTag::Max)
    }

    /// Substitutes a constant boolean value for `var` everywhere in `dd`
    /// (§4.2 `compose`), used to fix a variable before folding it out.
    pub fn compose(&mut self, dd: DdIndex, var: usize, value: bool) -> DdIndex {
        if let Some(&idx) = self.compose_cache.get(&(dd, var, value)) {
            return idx;
        }
        let node_info = match &self.nodes[dd.0] {
            Node::Terminal(_) => None,
            Node::Branch { var: v, low, high } => Some((*v, *low, *high)),
        };
        let result = match node_info {
            None => dd,
            Some((v, low, high)) => {
                if v > var {
                    dd
                } else if v == var {
                    if value {
                        high
                    } else {
                        low
                    }
                } else {
                    let new_low = self.compose(low, var, value);
                    let new_high = self.compose(high, var, value);
                    self.branch(v, new_low, new_high)
                }
            }
        };
        self.compose_cache.insert((dd, var, value), result);
        result
    }

    /// Evaluates `dd` under a full assignment (true = positive literal).
    pub fn eval_assignment(&self, dd: DdIndex, assignment: &HashMap<usize, bool>) -> Option<Number> {
        let mut cur = dd;
        loop {
            match &self.nodes[cur.0] {
                Node::Terminal(n) => return Some(n.clone()),
                Node::Branch { var, low, high } => {
                    let v = assignment.get(var)?;
                    cur = if *v { *high } else { *low };
                }
            }
        }
    }

    /// The set of variables this diagram still branches on.
    pub fn support(&self, dd: DdIndex) -> Vec<usize> {
        let mut seen = std::collections::HashSet::new();
        let mut vars = std::collections::BTreeSet::new();
        let mut stack = vec![dd];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            if let Node::Branch { var, low, high } = &self.nodes[idx.0] {
                vars.insert(*var);
                stack.push(*low);
                stack.push(*high);
            }
        }
        vars.into_iter().collect()
    }

    /// The number of distinct nodes reachable from `dd`.
    pub fn node_count(&self, dd: DdIndex) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![dd];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            if let Node::Branch { low, high, .. } = &self.nodes[idx.0] {
                stack.push(*low);
                stack.push(*high);
            }
        }
        seen.len()
    }

    /// Extracts the scalar value of a diagram with no remaining variables
    /// (§4.2 `extract_const`); fails if the diagram still branches.
    pub fn extract_const(&self, dd: DdIndex) -> Result<Number> {
        match &self.nodes[dd.0] {
            Node::Terminal(n) => Ok(n.clone()),
            Node::Branch { .. } => Err(AddmcError::Backend(
                "extract_const called on a non-constant diagram".into(),
            )),
        }
    }

    /// The "boolean difference" diagram used to replay a maximizer (§4.2,
    /// §4.4): `(self - other) >= 0` as a {0,1}-ADD. Implemented as a
    /// pointwise comparison, valid in both domains since `log10` is
    /// monotonic. Callers pass the two branch diagrams already composed for
    /// the variable under consideration (e.g. `bool_diff(t1, t0)`).
    pub fn bool_diff(&mut self, a: DdIndex, b: DdIndex) -> DdIndex {
        self.ge(a, b)
    }

    fn ge(&mut self, a: DdIndex, b: DdIndex) -> DdIndex {
        match (&self.nodes[a.0], &self.nodes[b.0]) {
            (Node::Terminal(x), Node::Terminal(y)) => {
                if x.ge(y) {
                    self.one()
                } else {
                    self.zero()
                }
            }
            _ => {
                let top = match (self.var_of(a), self.var_of(b)) {
                    (Some(va), Some(vb)) => va.min(vb),
                    (Some(va), None) => va,
                    (None, Some(vb)) => vb,
                    (None, None) => unreachable!(),
                };
                let (a_low, a_high) = self.children(a, top);
                let (b_low, b_high) = self.children(b, top);
                let low = self.ge(a_low, b_low);
                let high = self.ge(a_high, b_high);
                self.branch(top, low, high)
            }
        }
    }

    /// Renders the subgraph reachable from `dd` as Graphviz dot source (§6
    /// `--dot-dir`), in the style of `ddo-viz`'s `as_graphviz`: build up one
    /// string via `push_str`, one node declaration and its outgoing edges at
    /// a time, rather than compiling anything. Branch nodes show the
    /// variable they test; the low edge is dashed, the high edge solid.
    pub fn write_dot(&self, dd: DdIndex) -> String {
        let mut out = String::new();
        out.push_str("digraph {\n\tranksep = 1;\n\n");

        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![dd];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            match &self.nodes[idx.0] {
                Node::Terminal(value) => {
                    out.push_str(&format!(
                        "\t{} [shape=\"box\", label=\"{}\"];\n",
                        idx.0,
                        value.to_f64()
                    ));
                }
                Node::Branch { var, low, high } => {
                    out.push_str(&format!(
                        "\t{} [shape=\"circle\", label=\"x{}\"];\n",
                        idx.0, var
                    ));
                    out.push_str(&format!("\t{} -> {} [style=\"dashed\"];\n", idx.0, low.0));
                    out.push_str(&format!("\t{} -> {} [style=\"solid\"];\n", idx.0, high.0));
                    stack.push(*low);
                    stack.push(*high);
                }
            }
        }

        out.push_str("}\n");
        out
    }
}

impl fmt::Debug for DdIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dd#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(pairs: &[(usize, bool)]) -> HashMap<usize, bool> {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn reduction_collapses_identical_children() {
        let mut mgr = Manager::new(false);
        let one = mgr.one();
        let dd = mgr.var_literal(1, Number::one_rational(), Number::one_rational());
        assert_eq!(dd, one);
    }

    #[test]
    fn product_of_two_literals_evaluates_correctly() {
        let mut mgr = Manager::new(false);
        let x1 = mgr.var_literal(1, Number::zero_rational(), Number::one_rational());
        let x2 = mgr.var_literal(2, Number::zero_rational(), Number::one_rational());
        let product = mgr.product(x1, x2);

        assert_eq!(
            mgr.eval_assignment(product, &assign(&[(1, true), (2, true)]))
                .unwrap(),
            Number::one_rational()
        );
        assert_eq!(
            mgr.eval_assignment(product, &assign(&[(1, true), (2, false)]))
                .unwrap(),
            Number::zero_rational()
        );
    }

    #[test]
    fn compose_fixes_a_variable_and_shrinks_support() {
        let mut mgr = Manager::new(false);
        let x1 = mgr.var_literal(1, Number::zero_rational(), Number::one_rational());
        let x2 = mgr.var_literal(2, Number::zero_rational(), Number::one_rational());
        let product = mgr.product(x1, x2);

        let fixed = mgr.compose(product, 1, true);
        assert_eq!(mgr.support(fixed), vec![2]);
        assert_eq!(fixed, x2);
    }

    #[test]
    fn extract_const_fails_on_a_branching_diagram() {
        let mut mgr = Manager::new(false);
        let x1 = mgr.var_literal(1, Number::zero_rational(), Number::one_rational());
        assert!(mgr.extract_const(x1).is_err());
    }

    #[test]
    fn extract_const_succeeds_on_a_terminal() {
        let mut mgr = Manager::new(false);
        let one = mgr.one();
        assert_eq!(mgr.extract_const(one).unwrap(), Number::one_rational());
    }

    #[test]
    fn bool_diff_prefers_the_assignment_with_higher_value() {
        let mut mgr = Manager::new(false);
        // high branch (1) beats low branch (0): true always wins.
        let high = mgr.one();
        let low = mgr.zero();
        let diff = mgr.bool_diff(high, low);
        assert_eq!(
            mgr.eval_assignment(diff, &assign(&[])).unwrap(),
            Number::one_rational()
        );

        let diff_tie = mgr.bool_diff(low, low);
        assert_eq!(
            mgr.eval_assignment(diff_tie, &assign(&[])).unwrap(),
            Number::one_rational()
        );
    }

    #[test]
    fn node_count_and_support_ignore_unreachable_nodes() {
        let mut mgr = Manager::new(false);
        let x1 = mgr.var_literal(1, Number::zero_rational(), Number::one_rational());
        let _unused = mgr.var_literal(2, Number::zero_rational(), Number::one_rational());
        assert_eq!(mgr.support(x1), vec![1]);
        assert_eq!(mgr.node_count(x1), 3); // 1 branch + 2 terminals
    }

    #[test]
    fn write_dot_emits_one_declaration_per_reachable_node() {
        let mut mgr = Manager::new(false);
        let x1 = mgr.var_literal(1, Number::zero_rational(), Number::one_rational());
        let _unreachable = mgr.var_literal(2, Number::zero_rational(), Number::one_rational());

        let dot = mgr.write_dot(x1);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("label=\"x1\""));
        assert!(!dot.contains("label=\"x2\""));
    }

    #[test]
    fn log_domain_sum_matches_rational_sum() {
        let mut rat = Manager::new(false);
        let a = rat.constant(Number::from_f64_rational(0.3));
        let b = rat.constant(Number::from_f64_rational(0.7));
        let sum = rat.sum(a, b);
        assert!((rat.extract_const(sum).unwrap().to_f64() - 1.0).abs() < 1e-9);

        let mut log = Manager::new(true);
        let la = log.constant(Number::from_f64_log(0.3));
        let lb = log.constant(Number::from_f64_log(0.7));
        let lsum = log.sum(la, lb);
        assert!((log.extract_const(lsum).unwrap().to_f64() - 1.0).abs() < 1e-6);
    }
}
