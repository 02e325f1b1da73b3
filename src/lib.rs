// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A solver-orchestration core for a symbolic execution engine
//!
//! Sits between a symbolic executor and an external SMT solver: caches
//! query results, partitions a path condition into independent clusters
//! before delegating, pools incremental assertion stacks against a
//! bounded number of live solver processes, and can cross-check one
//! solver's answers against a trusted oracle. None of it talks to a real
//! symbolic executor or a real external solver process directly — the
//! external solver is the `z3` crate, linked in-process, and the
//! `Query`/`ConstraintSet`/expression types in this crate stand in for
//! whatever representation the calling executor uses internally.
//!
//! The layers compose bottom-up: a [`solver::adapter::Z3Adapter`] (or a
//! [`solver::pool::SolverPool`] of them) talks to Z3; wrap that in a
//! [`solver::independent::IndependentSolver`] to split path conditions
//! by disjoint array footprint, a [`solver::caching::CachingSolver`] to
//! skip re-asking a query already answered, a
//! [`solver::validating::ValidatingSolver`] to cross-check against a
//! second stack, and a [`solver::smtlib_log::SmtLibLoggingSolver`] to
//! dump or replay the SMT-LIBv2 text of every query. [`solver::Solver`]
//! is the outward-facing wrapper every caller actually holds; callers
//! build queries from [`query::Query`], drive them through
//! [`timing_solver::TimingSolver`] for the higher-level
//! evaluate/getRange/getInitialValues operations, and read timings back
//! off [`metadata::SolverQueryMetaData`].

pub mod assignment;
pub mod config;
pub mod constraints;
pub mod error;
pub mod expr;
pub mod metadata;
pub mod query;
pub mod solver;
pub mod timing_solver;

pub use assignment::Assignment;
pub use config::SolverConfig;
pub use constraints::ConstraintSet;
pub use error::{Result, SolverError};
pub use expr::{ArrayRef, Expr};
pub use metadata::{QueryTimer, SolverQueryMetaData};
pub use query::{PartialValidity, Query, SolverRunStatus, Validity};
pub use solver::{Solver, SolverImpl};
pub use timing_solver::TimingSolver;