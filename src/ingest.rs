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

//! Join-tree ingestion (§4.3): a streaming parser/state machine over a
//! line-oriented text stream, plus the monitor-thread timer protocol that
//! replaces the original tool's SIGALRM handler (§9 redesign).

use std::collections::BTreeSet;
use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::sync::Condvar;
use std::time::Duration;

use tracing::warn;

use crate::error::{AddmcError, Result};
use crate::jointree::{JoinNode, JoinTree};

#[derive(Debug, Default)]
struct PlannerState {
    var_count: usize,
    clause_count: usize,
    node_count: usize,
    nodes: Vec<Option<JoinNode>>,
    nonterminals_seen: usize,
    width: Option<usize>,
}

impl PlannerState {
    fn new(var_count: usize, clause_count: usize, node_count: usize) -> Self {
        let mut nodes = vec![None; node_count];
        for (i, slot) in nodes.iter_mut().enumerate().take(clause_count) {
            *slot = Some(JoinNode::Terminal { clause_index: i + 1 });
        }
        PlannerState {
            var_count,
            clause_count,
            node_count,
            nodes,
            nonterminals_seen: 0,
            width: None,
        }
    }

    fn into_tree(self, line: usize) -> Result<JoinTree> {
        if self.nonterminals_seen != self.node_count - self.clause_count {
            return Err(AddmcError::Input {
                line,
                message: format!(
                    "declared {} nonterminals but read {}",
                    self.node_count - self.clause_count,
                    self.nonterminals_seen
                ),
            });
        }
        let width = self.width.unwrap_or_else(|| {
            self.nodes
                .iter()
                .flatten()
                .map(|n| match n {
                    JoinNode::Nonterminal { cnf_vars, .. } => cnf_vars.len(),
                    JoinNode::Terminal { .. } => 0,
                })
                .max()
                .unwrap_or(0)
        });
        Ok(JoinTree {
            nodes: self.nodes,
            root: self.node_count.saturating_sub(1),
            declared_width: width,
        })
    }
}

struct MonitorFlags {
    stop: bool,
    tree_committed: bool,
    deadline_passed: bool,
}

/// Sends `SIGTERM` to the recorded planner process via the `kill` utility,
/// avoiding an `libc` dependency for one best-effort call.
fn kill_planner(pid: i64) {
    let status = std::process::Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status();
    if status.map(|s| !s.success()).unwrap_or(true) {
        warn!(pid, "failed to terminate planner process");
    }
}

/// Drives the join-tree stream state machine and the monitor-thread timer.
pub struct JoinTreeProcessor {
    planner_wait: Duration,
}

impl JoinTreeProcessor {
    pub fn new(planner_wait_seconds: f64) -> Self {
        JoinTreeProcessor {
            planner_wait: Duration::from_secs_f64(planner_wait_seconds.max(0.0)),
        }
    }

    /// Consumes `reader` to completion, returning the newest complete join
    /// tree seen. Fails with `NoJoinTree` if none ever completed.
    pub fn run<R: BufRead>(&self, reader: R) -> Result<JoinTree> {
        let flags = Arc::new((
            Mutex::new(MonitorFlags {
                stop: false,
                tree_committed: false,
                deadline_passed: false,
            }),
            Condvar::new(),
        ));
        let planner_pid: Arc<Mutex<Option<i64>>> = Arc::new(Mutex::new(None));

        let monitor_flags = Arc::clone(&flags);
        let deadline = self.planner_wait;
        let monitor_pid = Arc::clone(&planner_pid);
        let monitor = std::thread::spawn(move || {
            let (lock, cvar) = &*monitor_flags;
            let guard = lock.lock().unwrap();
            let (mut guard, result) = cvar
                .wait_timeout_while(guard, deadline, |f| !f.stop)
                .unwrap();
            if result.timed_out() && !guard.stop {
                if guard.tree_committed {
                    if let Some(pid) = *monitor_pid.lock().unwrap() {
                        kill_planner(pid);
                    }
                } else {
                    guard.deadline_passed = true;
                }
            }
        });

        let result = self.ingest_lines(reader, &flags, &planner_pid);

        {
            let (lock, cvar) = &*flags;
            lock.lock().unwrap().stop = true;
            cvar.notify_all();
        }
        let _ = monitor.join();

        result
    }

    fn ingest_lines<R: BufRead>(
        &self,
        reader: R,
        flags: &Arc<(Mutex<MonitorFlags>, Condvar)>,
        planner_pid: &Arc<Mutex<Option<i64>>>,
    ) -> Result<JoinTree> {
        let mut in_progress: Option<PlannerState> = None;
        let mut committed: Option<JoinTree> = None;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "=" {
                if let Some(state) = in_progress.take() {
                    match state.into_tree(line_no + 1) {
                        Ok(tree) => {
                            committed = Some(tree);
                            self.note_commit(flags, planner_pid);
                        }
                        Err(e) => warn!(error = %e, "discarding incomplete join tree"),
                    }
                }
                continue;
            }

            let mut words = line.split_whitespace();
            let head = words.next().unwrap();

            match head {
                "c" => {
                    let rest: Vec<&str> = words.collect();
                    if let ["pid", pid] = rest.as_slice() {
                        *planner_pid.lock().unwrap() = pid.parse().ok();
                    } else if let ["joinTreeWidth", w] = rest.as_slice() {
                        if let Some(state) = in_progress.as_mut() {
                            state.width = w.parse().ok();
                        }
                    }
                    // "seconds" and unrecognized comment keys carry no
                    // state here; logging them is the CLI layer's job.
                }
                "p" => {
                    if in_progress.is_some() {
                        return Err(AddmcError::Input {
                            line: line_no + 1,
                            message: "a new 'p' line arrived before '=' closed the previous tree"
                                .into(),
                        });
                    }
                    let rest: Vec<&str> = words.collect();
                    let [word, v, c, n] = rest[..] else {
                        return Err(AddmcError::Input {
                            line: line_no + 1,
                            message: format!("malformed problem line '{line}'"),
                        });
                    };
                    if word != "jt" {
                        return Err(AddmcError::Input {
                            line: line_no + 1,
                            message: format!("expected 'p jt', got 'p {word}'"),
                        });
                    }
                    let clause_count: usize = c.parse()?;
                    let node_count: usize = n.parse()?;
                    if clause_count > node_count {
                        return Err(AddmcError::Input {
                            line: line_no + 1,
                            message: format!(
                                "clause count {clause_count} exceeds node count {node_count}"
                            ),
                        });
                    }
                    in_progress = Some(PlannerState::new(v.parse()?, clause_count, node_count));
                }
                _ => {
                    let state = in_progress.as_mut().ok_or_else(|| AddmcError::Input {
                        line: line_no + 1,
                        message: "nonterminal line arrived before a problem line".into(),
                    })?;
                    self.parse_nonterminal(state, head, words, line_no + 1)?;
                }
            }
        }

        if let Some(state) = in_progress.take() {
            match state.into_tree(usize::MAX) {
                Ok(tree) => {
                    committed = Some(tree);
                    self.note_commit(flags, planner_pid);
                }
                Err(e) => warn!(error = %e, "discarding incomplete join tree at EOF"),
            }
        }

        committed.ok_or(AddmcError::NoJoinTree)
    }

    fn note_commit(
        &self,
        flags: &Arc<(Mutex<MonitorFlags>, Condvar)>,
        planner_pid: &Arc<Mutex<Option<i64>>>,
    ) {
        let (lock, _) = &**flags;
        let mut guard = lock.lock().unwrap();
        guard.tree_committed = true;
        if guard.deadline_passed {
            if let Some(pid) = *planner_pid.lock().unwrap() {
                kill_planner(pid);
            }
        }
    }

    fn parse_nonterminal<'a>(
        &self,
        state: &mut PlannerState,
        head: &str,
        rest: impl Iterator<Item = &'a str>,
        line_no: usize,
    ) -> Result<()> {
        let idx: usize = head.parse()?;
        let pos = idx
            .checked_sub(1)
            .ok_or_else(|| AddmcError::Input {
                line: line_no,
                message: "node index must be positive".into(),
            })?;
        if pos < state.clause_count || pos >= state.node_count {
            return Err(AddmcError::Input {
                line: line_no,
                message: format!(
                    "nonterminal index {idx} out of range [{}, {}]",
                    state.clause_count + 1,
                    state.node_count
                ),
            });
        }

        let mut children = Vec::new();
        let mut cnf_vars = BTreeSet::new();
        let mut in_vars = false;
        for tok in rest {
            if tok == "e" {
                in_vars = true;
                continue;
            }
            if in_vars {
                let v: usize = tok.parse()?;
                if v == 0 || v > state.var_count {
                    return Err(AddmcError::Input {
                        line: line_no,
                        message: format!("eliminated variable {v} out of range"),
                    });
                }
                cnf_vars.insert(v);
            } else {
                let child: usize = tok.parse()?;
                let child_pos = child.checked_sub(1).ok_or_else(|| AddmcError::Input {
                    line: line_no,
                    message: "child index must be positive".into(),
                })?;
                if child_pos >= pos {
                    return Err(AddmcError::Input {
                        line: line_no,
                        message: format!("child index {child} must precede parent {idx}"),
                    });
                }
                if state.nodes.get(child_pos).and_then(|n| n.as_ref()).is_none() {
                    return Err(AddmcError::Input {
                        line: line_no,
                        message: format!("child index {child} has no node yet"),
                    });
                }
                children.push(child_pos);
            }
        }

        state.nodes[pos] = Some(JoinNode::Nonterminal { children, cnf_vars });
        state.nonterminals_seen += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(stream: &str) -> Result<JoinTree> {
        let processor = JoinTreeProcessor::new(0.05);
        processor.run(Cursor::new(stream))
    }

    #[test]
    fn ingests_a_minimal_tree_with_one_nonterminal() {
        let tree = run("p jt 2 1 2\n2 1 e 1 2\n=\n").unwrap();
        assert_eq!(tree.root, 1);
        match tree.node(1).unwrap() {
            JoinNode::Nonterminal { children, cnf_vars } => {
                assert_eq!(children, &vec![0]);
                assert_eq!(cnf_vars, &[1, 2].into_iter().collect());
            }
            _ => panic!("expected a nonterminal at the root"),
        }
    }

    #[test]
    fn keeps_the_previous_tree_when_the_final_one_is_incomplete() {
        let tree = run("p jt 1 1 2\n2 1 e 1\n=\np jt 1 1 2\n").unwrap();
        assert_eq!(tree.root, 1);
    }

    #[test]
    fn rejects_a_second_problem_line_before_separator() {
        let err = run("p jt 1 1 2\np jt 1 1 2\n").unwrap_err();
        assert!(matches!(err, AddmcError::Input { .. }));
    }

    #[test]
    fn rejects_a_child_index_pointing_forward() {
        let err = run("p jt 1 2 3\n3 2 e 1\n=\n").unwrap_err();
        assert!(matches!(err, AddmcError::Input { .. }));
    }

    #[test]
    fn fails_with_no_join_tree_when_stream_is_empty() {
        assert!(matches!(run(""), Err(AddmcError::NoJoinTree)));
    }

    #[test]
    fn nonterminal_count_mismatch_discards_the_tree() {
        let err = run("p jt 1 1 3\n2 1 e 1\n=\n");
        assert!(matches!(err, Err(AddmcError::NoJoinTree)));
    }
}
