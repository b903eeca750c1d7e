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

//! Thin CLI shell around the `addmc` library: argument parsing, wiring, and
//! row printing only. All actual evaluation lives in the library crate.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use addmc::config::{Backend, JoinPriority, VarOrderHeuristic};
use addmc::finalizer::{Satisfiability, Solution, SolutionType};
use addmc::{AddmcError, Cnf, Executor, RunConfigBuilder};

#[derive(Parser, Debug)]
#[command(name = "addmc", about = "A weighted, projected, exist-random model counter")]
struct Args {
    /// Path to the weighted-CNF instance.
    #[arg(long)]
    cnf: PathBuf,

    #[arg(long, default_value_t = false)]
    weighted_counting: bool,
    #[arg(long, default_value_t = false)]
    projected_counting: bool,
    #[arg(long, default_value_t = false)]
    exist_random: bool,
    #[arg(long, default_value_t = false)]
    maximizing_assignment: bool,

    #[arg(long, default_value_t = 10.0)]
    planner_wait: f64,

    #[arg(long, value_enum, default_value = "cudd")]
    dd_package: BackendArg,

    #[arg(long, default_value_t = 1)]
    thread_count: usize,
    #[arg(long, default_value_t = 1)]
    thread_slice_count: usize,

    #[arg(long, default_value_t = 0)]
    random_seed: i64,

    #[arg(long, default_value_t = 1)]
    dd_var_order: i64,
    #[arg(long, default_value_t = 1)]
    slice_var_order: i64,

    #[arg(long, default_value_t = 1e3)]
    mem_sensitivity: f64,
    #[arg(long, default_value_t = 4e3)]
    max_mem: f64,

    #[arg(long, default_value_t = 1)]
    table_ratio: i64,
    #[arg(long, default_value_t = 10)]
    init_ratio: i64,

    #[arg(long, default_value_t = false)]
    multiple_precision: bool,
    #[arg(long, default_value_t = false)]
    log_counting: bool,

    #[arg(long, value_enum, default_value = "smallest-pair")]
    join_priority: JoinPriorityArg,

    #[arg(long, default_value_t = 0)]
    verbose_cnf: i64,
    #[arg(long, default_value_t = 0)]
    verbose_join_tree: i64,
    #[arg(long, default_value_t = 0)]
    verbose_profiling: i64,
    #[arg(long, default_value_t = 1)]
    verbose_solving: i64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Cudd,
    Sylvan,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Cudd => Backend::Cudd,
            BackendArg::Sylvan => Backend::Sylvan,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum JoinPriorityArg {
    Arbitrary,
    SmallestPair,
    LargestPair,
}

impl From<JoinPriorityArg> for JoinPriority {
    fn from(p: JoinPriorityArg) -> Self {
        match p {
            JoinPriorityArg::Arbitrary => JoinPriority::Arbitrary,
            JoinPriorityArg::SmallestPair => JoinPriority::SmallestPair,
            JoinPriorityArg::LargestPair => JoinPriority::LargestPair,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("c error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), AddmcError> {
    let cnf = read_cnf(&args.cnf)?;

    let config = RunConfigBuilder::default()
        .weighted_counting(args.weighted_counting)
        .projected_counting(args.projected_counting)
        .exist_random(args.exist_random)
        .maximizing_assignment(args.maximizing_assignment)
        .planner_wait_seconds(args.planner_wait)
        .dd_package(Backend::from(args.dd_package))
        .thread_count(args.thread_count)
        .thread_slice_count(args.thread_slice_count)
        .random_seed(args.random_seed)
        .dd_var_order(VarOrderHeuristic(args.dd_var_order))
        .slice_var_order(VarOrderHeuristic(args.slice_var_order))
        .mem_sensitivity_mb(args.mem_sensitivity)
        .max_mem_mb(args.max_mem)
        .table_ratio(args.table_ratio)
        .init_ratio(args.init_ratio)
        .multiple_precision(args.multiple_precision)
        .log_counting(args.log_counting)
        .join_priority(JoinPriority::from(args.join_priority))
        .verbose_cnf(args.verbose_cnf)
        .verbose_join_tree(args.verbose_join_tree)
        .verbose_profiling(args.verbose_profiling)
        .verbose_solving(args.verbose_solving)
        .build()
        .map_err(|e| AddmcError::Semantic(e.to_string()))?;

    println!("c processing {}", args.cnf.display());
    let stdin = io::stdin();
    let solution = Executor::run(cnf, stdin.lock(), config)?;
    print_solution(&solution);
    Ok(())
}

fn read_cnf(path: &PathBuf) -> Result<Cnf, AddmcError> {
    let file = File::open(path)?;
    addmc::cnf::read_wcnf(BufReader::new(file))
}

fn print_solution(solution: &Solution) {
    let verdict = match solution.satisfiability {
        Satisfiability::Satisfiable => "SATISFIABLE",
        Satisfiability::Unsatisfiable => "UNSATISFIABLE",
        Satisfiability::Unknown => "UNKNOWN",
    };
    println!("s {verdict}");

    let type_tag = match solution.solution_type {
        SolutionType::ModelCount => "mc",
        SolutionType::WeightedModelCount => "wmc",
        SolutionType::ProbabilisticModelCount => "pmc",
    };
    println!("s type {type_tag}");
    println!("s log10-estimate {}", solution.log10_estimate);
    println!("s exact double prec-sci {}", solution.value.to_f64());

    if let Some(assignment) = &solution.assignment {
        let row = assignment
            .iter()
            .map(|lit| lit.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        println!("v {row} 0");
    }
}
