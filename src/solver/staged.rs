//! Tries a cheap, possibly-incomplete heuristic before falling back to
//! a complete decision procedure
//!
//! Grounded on `examples/original_source/lib/Solver/IncompleteSolver.cpp`'s
//! `StagedSolverImpl`: an `IncompleteSolver` answers what it can
//! (`MustBeTrue`/`MustBeFalse`) and reports `Unknown` rather than guess;
//! `StagedSolverImpl` falls through to the wrapped complete solver only
//! when the incomplete stage didn't reach a definite answer.

use crate::assignment::Assignment;
use crate::error::Result;
use crate::expr::{ArrayRef, Expr};
use crate::query::{PartialValidity, Query, SolverRunStatus, Validity};
use crate::solver::SolverImpl;

/// A cheap heuristic that may not be able to answer every query. Used
/// as the fast first stage in front of a complete `SolverImpl`.
pub trait IncompleteSolverImpl {
    fn compute_truth(&mut self, query: &Query) -> Result<PartialValidity>;
    fn compute_validity(&mut self, query: &Query) -> Result<PartialValidity>;
}

pub struct StagedSolver {
    fast: Box<dyn IncompleteSolverImpl>,
    complete: Box<dyn SolverImpl>,
}

impl StagedSolver {
    pub fn new(fast: Box<dyn IncompleteSolverImpl>, complete: Box<dyn SolverImpl>) -> Self {
        StagedSolver { fast, complete }
    }
}

impl SolverImpl for StagedSolver {
    fn compute_truth(&mut self, query: &Query) -> Result<bool> {
        match self.fast.compute_truth(query)? {
            PartialValidity::MustBeTrue => Ok(true),
            PartialValidity::MustBeFalse => Ok(false),
            PartialValidity::MayBeTrue
            | PartialValidity::MayBeFalse
            | PartialValidity::TrueOrFalse
            | PartialValidity::Unknown => self.complete.compute_truth(query),
        }
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity> {
        match self.fast.compute_validity(query)?.to_validity() {
            Some(v) if v != Validity::Unknown => Ok(v),
            _ => self.complete.compute_validity(query),
        }
    }

    fn compute_value(&mut self, query: &Query) -> Result<Expr> {
        self.complete.compute_value(query)
    }

    fn compute_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        self.complete.compute_initial_values(query, objects)
    }

    fn set_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.complete.set_timeout(timeout);
    }

    fn constraint_log(&mut self, query: &Query) -> Result<String> {
        self.complete.constraint_log(query)
    }

    fn get_operation_status_code(&self) -> SolverRunStatus {
        self.complete.get_operation_status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintSet;
    use crate::expr::BOOL_WIDTH;
    use crate::solver::test_support::RecordingSolver;

    struct AlwaysUnknown;
    impl IncompleteSolverImpl for AlwaysUnknown {
        fn compute_truth(&mut self, _query: &Query) -> Result<PartialValidity> {
            Ok(PartialValidity::Unknown)
        }
        fn compute_validity(&mut self, _query: &Query) -> Result<PartialValidity> {
            Ok(PartialValidity::Unknown)
        }
    }

    struct AlwaysConfident;
    impl IncompleteSolverImpl for AlwaysConfident {
        fn compute_truth(&mut self, _query: &Query) -> Result<PartialValidity> {
            Ok(PartialValidity::MustBeTrue)
        }
        fn compute_validity(&mut self, _query: &Query) -> Result<PartialValidity> {
            Ok(PartialValidity::MustBeTrue)
        }
    }

    #[test]
    fn unknown_falls_through_to_complete_solver() {
        let mut solver = StagedSolver::new(Box::new(AlwaysUnknown), Box::new(RecordingSolver::default()));
        let q = Query::new(ConstraintSet::new(), Expr::constant(1, BOOL_WIDTH));
        assert!(solver.compute_truth(&q).unwrap());
    }

    #[test]
    fn confident_answer_skips_complete_solver() {
        let recorder = RecordingSolver::default();
        let seen = recorder.seen.clone();
        let mut solver = StagedSolver::new(Box::new(AlwaysConfident), Box::new(recorder));
        let q = Query::new(ConstraintSet::new(), Expr::constant(1, BOOL_WIDTH));
        assert!(solver.compute_truth(&q).unwrap());
        assert!(seen.borrow().is_empty());
    }
}
