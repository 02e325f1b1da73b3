//! Test doubles shared across the solver-layer unit tests
//!
//! Kept separate from any one layer's own test module so the partitioner,
//! cache, and validating-wrapper tests can all exercise the same simple
//! stand-ins without depending on each other's `#[cfg(test)]` modules.
#![cfg(test)]

use std::cell::RefCell;
use std::rc::Rc;

use crate::assignment::Assignment;
use crate::constraints::ConstraintSet;
use crate::error::Result;
use crate::expr::{ArrayRef, Expr, ExprKind};
use crate::query::{Query, Validity};
use crate::solver::SolverImpl;

/// Records every query it's asked about and always reports success.
#[derive(Default)]
pub(crate) struct RecordingSolver {
    pub(crate) seen: Rc<RefCell<Vec<Query>>>,
}

impl SolverImpl for RecordingSolver {
    fn compute_truth(&mut self, query: &Query) -> Result<bool> {
        self.seen.borrow_mut().push(query.clone());
        Ok(true)
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity> {
        self.seen.borrow_mut().push(query.clone());
        Ok(Validity::True)
    }

    fn compute_value(&mut self, query: &Query) -> Result<Expr> {
        self.seen.borrow_mut().push(query.clone());
        Ok(query.expr.clone())
    }

    fn compute_initial_values(
        &mut self,
        query: &Query,
        _objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        self.seen.borrow_mut().push(query.clone());
        Ok(Some(Assignment::new()))
    }

    fn constraint_log(&mut self, query: &Query) -> Result<String> {
        self.seen.borrow_mut().push(query.clone());
        Ok(format!("(assert {:?})", query.expr))
    }
}

/// Builds the single assignment implied by a constraint set's literal
/// `Eq(Read(array, const-offset), Constant(v))` conjuncts, defaulting
/// every other byte to zero. Shared by `ModelSolver`'s truth and
/// initial-values operations so both agree on the same toy model.
fn implied_assignment(constraints: &ConstraintSet) -> Assignment {
    let mut assignment = Assignment::new();
    for c in constraints.iter() {
        if let ExprKind::Eq(lhs, rhs) = c.kind() {
            if let (ExprKind::Read(updates, index), Some(v)) = (lhs.kind(), rhs.as_constant()) {
                if !updates.has_updates() {
                    if let Some(offset) = index.as_constant() {
                        let array = &updates.root;
                        let mut bytes = assignment
                            .get(array)
                            .map(|b| b.to_vec())
                            .unwrap_or_else(|| vec![0; array.size() as usize]);
                        if (offset as usize) < bytes.len() {
                            bytes[offset as usize] = v as u8;
                        }
                        assignment.bind(array.clone(), bytes);
                    }
                }
            }
        }
    }
    assignment
}

/// A toy decision procedure that reads `Eq(Read(array, 0), Constant(v))`
/// constraints directly to produce a model, standing in for a real SMT
/// backend when exercising the partitioner and the timing facade. Sound
/// only for the scope these tests exercise: every array relevant to a
/// query is fully pinned by such equalities, so the single implied
/// assignment is the query's only model and evaluating against it
/// decides truth exactly.
pub(crate) struct ModelSolver;

impl SolverImpl for ModelSolver {
    fn compute_truth(&mut self, query: &Query) -> Result<bool> {
        let assignment = implied_assignment(&query.constraints);
        Ok(assignment.satisfies(&query.expr))
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity> {
        Ok(if self.compute_truth(query)? { Validity::True } else { Validity::False })
    }

    fn compute_value(&mut self, query: &Query) -> Result<Expr> {
        let assignment = implied_assignment(&query.constraints);
        Ok(assignment.evaluate(&query.expr))
    }

    fn compute_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        let mut assignment = implied_assignment(&query.constraints);
        for obj in objects {
            if assignment.get(obj).is_none() {
                assignment.bind(obj.clone(), vec![0; obj.size() as usize]);
            }
        }
        if query.constraints.iter().all(|c| assignment.satisfies(c)) {
            Ok(Some(assignment))
        } else {
            Ok(None)
        }
    }
}
