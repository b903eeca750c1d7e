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

//! The taxonomy of errors surfaced by the engine (see §7 of the design).
//!
//! Nothing in this crate retries on error: every fallible entry point returns
//! a `Result<_, AddmcError>` and lets the caller (in practice, the `addmc`
//! binary) decide what to do with it.

use thiserror::Error;

/// Every hard failure the engine can report.
#[derive(Debug, Error)]
pub enum AddmcError {
    /// A malformed join-tree line, an out-of-range index, a missing problem
    /// line, or an inconsistent count, raised while ingesting a join tree.
    #[error("input error at line {line}: {message}")]
    Input { line: usize, message: String },

    /// A forbidden combination of run options (e.g. `maximizing` without
    /// `exist_random`, or `log_counting` with a backend that does not support
    /// it).
    #[error("semantic error: {0}")]
    Semantic(String),

    /// Neither a complete join tree arrived before EOF, nor a previously
    /// committed tree exists to fall back on.
    #[error("no join tree arrived before end of input")]
    NoJoinTree,

    /// The diagram adapter reported an invariant violation, an exhausted
    /// memory budget, or a worker thread panicked.
    #[error("diagram backend error: {0}")]
    Backend(String),

    /// A malformed CNF file.
    #[error("cnf parse error: {0}")]
    CnfFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected an integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("expected a number: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
}

pub type Result<T> = std::result::Result<T, AddmcError>;
