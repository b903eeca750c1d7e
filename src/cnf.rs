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

//! The CNF data model (§3) plus a minimal weighted-DIMACS reference reader
//! (§4.8) that satisfies the "CNF parser" contract well enough to run the
//! engine end to end without an external tool.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use crate::error::{AddmcError, Result};
use crate::numeric::Number;

/// A signed literal: positive magnitude is the variable id (1-indexed),
/// negative sign is negation. `Literal(0)` never occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal(pub i64);

impl Literal {
    pub fn var(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn negate(self) -> Literal {
        Literal(-self.0)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Literal {
    type Err = AddmcError;

    fn from_str(s: &str) -> Result<Self> {
        let v: i64 = s.parse()?;
        if v == 0 {
            return Err(AddmcError::CnfFormat("literal '0' inside a clause body".into()));
        }
        Ok(Literal(v))
    }
}

pub type Clause = Vec<Literal>;

/// The CNF instance (§3): declared size, clauses, per-literal weights, and
/// the outer/apparent variable partitions needed by the finalizer.
#[derive(Debug, Clone)]
pub struct Cnf {
    pub declared_var_count: usize,
    pub clauses: Vec<Clause>,
    pub literal_weights: HashMap<i64, Number>,
    pub outer_vars: BTreeSet<usize>,
    pub weighted: bool,
}

impl Cnf {
    /// Variables that occur in at least one clause (§3 "apparent variable").
    pub fn apparent_vars(&self) -> BTreeSet<usize> {
        let mut vars = BTreeSet::new();
        for clause in &self.clauses {
            for lit in clause {
                vars.insert(lit.var());
            }
        }
        vars
    }

    pub fn has_empty_clause(&self) -> bool {
        self.clauses.iter().any(|c| c.is_empty())
    }

    /// The non-negative weight of a literal, defaulting to `1` (rational) or
    /// `log10(1) = 0` (log domain) when unweighted or unspecified.
    pub fn literal_weight(&self, lit: Literal, log_domain: bool) -> Number {
        match self.literal_weights.get(&lit.0) {
            Some(n) => n.clone(),
            None => {
                if log_domain {
                    Number::one_log()
                } else {
                    Number::one_rational()
                }
            }
        }
    }
}

/// Reads a minimal weighted-CNF stream (§4.8):
///
/// - `c` lines are comments, except `c p weight <lit> <w>` which records a
///   literal's weight, and `c p var <v...> 0` which declares the outer-
///   variable set;
/// - `p cnf V C` or `p wcnf V C` declares the instance size;
/// - every other non-comment, non-blank line is a clause: whitespace
///   separated literals terminated by a trailing `0`.
pub fn read_wcnf<R: BufRead>(reader: R) -> Result<Cnf> {
    let mut declared_var_count = 0usize;
    let mut declared_clause_count: Option<usize> = None;
    let mut clauses = Vec::new();
    let mut literal_weights = HashMap::new();
    let mut outer_vars = BTreeSet::new();
    let mut weighted = false;
    let mut saw_header = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        let head = words.next().unwrap();

        if head == "c" {
            let rest: Vec<&str> = words.collect();
            match rest.as_slice() {
                ["p", "weight", lit, w] => {
                    let lit: Literal = lit.parse()?;
                    let w: f64 = w.parse()?;
                    literal_weights.insert(lit.0, Number::from_f64_rational(w));
                    weighted = true;
                }
                ["p", "var", rest @ ..] => {
                    for v in rest {
                        let v: i64 = v.parse()?;
                        if v != 0 {
                            outer_vars.insert(v as usize);
                        }
                    }
                }
                _ => {}
            }
            continue;
        }

        if head == "p" {
            let rest: Vec<&str> = words.collect();
            if rest.len() != 3 || (rest[0] != "cnf" && rest[0] != "wcnf") {
                return Err(AddmcError::CnfFormat(format!(
                    "line {}: malformed problem line '{}'",
                    line_no + 1,
                    line
                )));
            }
            declared_var_count = rest[1].parse()?;
            declared_clause_count = Some(rest[2].parse()?);
            saw_header = true;
            continue;
        }

        if !saw_header {
            return Err(AddmcError::CnfFormat(format!(
                "line {}: clause before problem line",
                line_no + 1
            )));
        }

        let mut clause = Vec::new();
        let mut terminated = false;
        for tok in std::iter::once(head).chain(words) {
            let v: i64 = tok.parse()?;
            if v == 0 {
                terminated = true;
                break;
            }
            let lit = Literal(v);
            if lit.var() > declared_var_count {
                return Err(AddmcError::CnfFormat(format!(
                    "line {}: literal {} exceeds declared var count {}",
                    line_no + 1,
                    lit,
                    declared_var_count
                )));
            }
            clause.push(lit);
        }
        if !terminated {
            return Err(AddmcError::CnfFormat(format!(
                "line {}: clause not terminated by '0'",
                line_no + 1
            )));
        }
        clauses.push(clause);
    }

    if !saw_header {
        return Err(AddmcError::CnfFormat("missing 'p cnf' problem line".into()));
    }
    if let Some(expected) = declared_clause_count {
        if clauses.len() != expected {
            return Err(AddmcError::CnfFormat(format!(
                "declared {} clauses but read {}",
                expected,
                clauses.len()
            )));
        }
    }

    Ok(Cnf {
        declared_var_count,
        clauses,
        literal_weights,
        outer_vars,
        weighted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(s: &str) -> Result<Cnf> {
        read_wcnf(Cursor::new(s))
    }

    #[test]
    fn parses_a_well_formed_instance() {
        let cnf = read(
            "c a tautology\n\
             p cnf 1 1\n\
             1 -1 0\n",
        )
        .unwrap();
        assert_eq!(cnf.declared_var_count, 1);
        assert_eq!(cnf.clauses.len(), 1);
        assert_eq!(cnf.clauses[0], vec![Literal(1), Literal(-1)]);
    }

    #[test]
    fn parses_literal_weights_and_outer_vars() {
        let cnf = read(
            "p cnf 1 1\n\
             c p weight 1 0.3\n\
             c p weight -1 0.7\n\
             c p var 1 0\n\
             1 0\n",
        )
        .unwrap();
        assert!(cnf.weighted);
        assert_eq!(cnf.outer_vars, [1].into_iter().collect());
        assert_eq!(cnf.literal_weight(Literal(1), false).to_f64(), 0.3);
        assert_eq!(cnf.literal_weight(Literal(-1), false).to_f64(), 0.7);
    }

    #[test]
    fn rejects_missing_problem_line() {
        assert!(read("1 0\n").is_err());
    }

    #[test]
    fn rejects_clause_without_terminator() {
        assert!(read("p cnf 1 1\n1\n").is_err());
    }

    #[test]
    fn rejects_out_of_range_literal() {
        assert!(read("p cnf 1 1\n2 0\n").is_err());
    }

    #[test]
    fn rejects_clause_count_mismatch() {
        assert!(read("p cnf 1 2\n1 0\n").is_err());
    }

    #[test]
    fn empty_clause_is_legal_and_marks_unsat() {
        let cnf = read("p cnf 1 1\n0\n").unwrap();
        assert!(cnf.has_empty_clause());
    }

    #[test]
    fn apparent_vars_excludes_hidden_variables() {
        let cnf = read("p cnf 2 1\n1 0\n").unwrap();
        assert_eq!(cnf.apparent_vars(), [1].into_iter().collect());
    }
}
