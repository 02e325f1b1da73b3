//! A solver layer that never answers — line-for-line grounded on
//! `examples/original_source/lib/Solver/DummySolver.cpp`
//!
//! Useful as the bottom of a stack during development, or to prove that
//! an outer layer (the cache, the validating wrapper) never silently
//! swallows a failure it should propagate.

use crate::assignment::Assignment;
use crate::error::{Result, SolverError};
use crate::expr::{ArrayRef, Expr};
use crate::query::{Query, Validity};
use crate::solver::SolverImpl;

#[derive(Debug, Default)]
pub struct DummySolver;

impl DummySolver {
    pub fn new() -> Self {
        DummySolver
    }
}

impl SolverImpl for DummySolver {
    fn compute_truth(&mut self, _query: &Query) -> Result<bool> {
        Err(SolverError::transport("DummySolver never answers"))
    }

    fn compute_validity(&mut self, _query: &Query) -> Result<Validity> {
        Err(SolverError::transport("DummySolver never answers"))
    }

    fn compute_value(&mut self, _query: &Query) -> Result<Expr> {
        Err(SolverError::transport("DummySolver never answers"))
    }

    fn compute_initial_values(
        &mut self,
        _query: &Query,
        _objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        Err(SolverError::transport("DummySolver never answers"))
    }
}
