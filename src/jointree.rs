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

//! The join-tree data model (§3): the output of an external planner, read
//! one node at a time by `ingest.rs` and then walked bottom-up by
//! `evaluator.rs`.

use std::collections::BTreeSet;

/// One node of a join tree, identified by its 1-indexed position in the
/// stream that declared it.
#[derive(Debug, Clone)]
pub enum JoinNode {
    /// A leaf standing for one CNF clause, by its 1-indexed position among
    /// the CNF's clauses.
    Terminal { clause_index: usize },
    /// An internal node joining its children's variables; `cnf_vars` is the
    /// set of apparent CNF variables this subtree is responsible for
    /// projecting out once all of its children have been combined.
    Nonterminal {
        children: Vec<usize>,
        cnf_vars: BTreeSet<usize>,
    },
}

/// A complete join tree as ingested from the planner stream (§4.3): every
/// node keyed by its declared index, plus the root and the width the
/// planner reported for it.
#[derive(Debug, Clone)]
pub struct JoinTree {
    pub nodes: Vec<Option<JoinNode>>,
    pub root: usize,
    pub declared_width: usize,
}

impl JoinTree {
    pub fn node(&self, index: usize) -> Option<&JoinNode> {
        self.nodes.get(index).and_then(|n| n.as_ref())
    }

    /// Every CNF variable any node in the tree is responsible for
    /// projecting, used by the finalizer to fold the variables the tree
    /// never mentions (§4.6 "hidden variables").
    pub fn pre_projection_vars(&self) -> BTreeSet<usize> {
        let mut vars = BTreeSet::new();
        for node in self.nodes.iter().flatten() {
            if let JoinNode::Nonterminal { cnf_vars, .. } = node {
                vars.extend(cnf_vars.iter().copied());
            }
        }
        vars
    }
}

/// A full or partial truth assignment to CNF variables, used both to slice
/// outer-variable buckets (§4.5) and to record a maximizing solution (§4.6).
pub type Assignment = std::collections::BTreeMap<usize, bool>;
