//! Cross-checks a primary solver's answers against a trusted oracle
//!
//! Grounded on `examples/original_source/lib/Solver/ValidatingSolver.cpp`:
//! every operation asks the primary solver, then asks (or, for a model,
//! substitutes into and checks against) the oracle, and treats any
//! disagreement as the fatal bug it is — `assert(0 && "invalid solver
//! result")` in the original becomes a `SolverError::Invariant` here,
//! since panicking across an FFI-adjacent boundary is worse behavior
//! than a caller-visible fatal error.

use crate::assignment::Assignment;
use crate::error::{Result, SolverError};
use crate::expr::{ArrayRef, Expr};
use crate::query::{Query, SolverRunStatus, Validity};
use crate::solver::SolverImpl;

pub struct ValidatingSolver {
    primary: Box<dyn SolverImpl>,
    oracle: Box<dyn SolverImpl>,
}

impl ValidatingSolver {
    pub fn new(primary: Box<dyn SolverImpl>, oracle: Box<dyn SolverImpl>) -> Self {
        ValidatingSolver { primary, oracle }
    }
}

impl SolverImpl for ValidatingSolver {
    fn compute_truth(&mut self, query: &Query) -> Result<bool> {
        let answer = self.primary.compute_truth(query)?;
        let check = self.oracle.compute_truth(query)?;
        if answer != check {
            return Err(SolverError::invariant(format!(
                "validating solver disagreement on computeTruth: primary={answer} oracle={check}"
            )));
        }
        Ok(answer)
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity> {
        let answer = self.primary.compute_validity(query)?;
        let check = self.oracle.compute_validity(query)?;
        if answer != check {
            return Err(SolverError::invariant(format!(
                "validating solver disagreement on computeValidity: primary={answer:?} oracle={check:?}"
            )));
        }
        Ok(answer)
    }

    fn compute_value(&mut self, query: &Query) -> Result<Expr> {
        let value = self.primary.compute_value(query)?;
        // The oracle doesn't need to reproduce the same value — only
        // confirm that `value` is one the original query actually
        // admits, i.e. that `constraints ∧ (expr == value)` is valid.
        let check_query = query.with_expr(Expr::eq(query.expr.clone(), value.clone()));
        let valid = self.oracle.compute_truth(&check_query)?;
        if !valid {
            return Err(SolverError::invariant(
                "validating solver disagreement on computeValue: oracle rejects primary's value",
            ));
        }
        Ok(value)
    }

    fn compute_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        let result = self.primary.compute_initial_values(query, objects)?;
        match &result {
            Some(assignment) => {
                for c in query.full_constraints().iter() {
                    if !assignment.satisfies(c) {
                        return Err(SolverError::invariant(
                            "validating solver disagreement: primary's model fails a constraint",
                        ));
                    }
                }
            }
            None => {
                let unsat = self.oracle.compute_truth(&query.negate_expr())?;
                if !unsat {
                    return Err(SolverError::invariant(
                        "validating solver disagreement: primary reports UNSAT, oracle disagrees",
                    ));
                }
            }
        }
        Ok(result)
    }

    fn set_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.primary.set_timeout(timeout);
        self.oracle.set_timeout(timeout);
    }

    fn constraint_log(&mut self, query: &Query) -> Result<String> {
        self.primary.constraint_log(query)
    }

    fn get_operation_status_code(&self) -> SolverRunStatus {
        self.primary.get_operation_status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintSet;
    use crate::expr::BOOL_WIDTH;
    use crate::solver::test_support::RecordingSolver;

    struct AlwaysFalseTruth;
    impl SolverImpl for AlwaysFalseTruth {
        fn compute_truth(&mut self, _query: &Query) -> Result<bool> {
            Ok(false)
        }
        fn compute_validity(&mut self, _query: &Query) -> Result<Validity> {
            Ok(Validity::False)
        }
        fn compute_value(&mut self, _query: &Query) -> Result<Expr> {
            Ok(Expr::constant(0, 8))
        }
        fn compute_initial_values(
            &mut self,
            _query: &Query,
            _objects: &[ArrayRef],
        ) -> Result<Option<Assignment>> {
            Ok(None)
        }
    }

    #[test]
    fn agreement_passes_through() {
        let mut solver =
            ValidatingSolver::new(Box::new(RecordingSolver::default()), Box::new(RecordingSolver::default()));
        let q = Query::new(ConstraintSet::new(), Expr::constant(1, BOOL_WIDTH));
        assert!(solver.compute_truth(&q).unwrap());
    }

    #[test]
    fn disagreement_is_fatal() {
        let mut solver =
            ValidatingSolver::new(Box::new(RecordingSolver::default()), Box::new(AlwaysFalseTruth));
        let arr = crate::expr::ArrayRef::new_symbolic("x", 1);
        let byte = Expr::read(crate::expr::UpdateList::root(arr), Expr::constant(0, 32));
        let q = Query::new(ConstraintSet::new(), Expr::eq(byte, Expr::constant(1, 8)));
        assert!(solver.compute_truth(&q).is_err());
    }
}
