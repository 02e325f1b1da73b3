//! The solver layer stack: a capability trait plus the thin wrapper
//! every caller actually talks to
//!
//! Grounded on `examples/original_source/lib/Solver/Solver.cpp`: the
//! `SolverImpl` interface mirrors `klee::SolverImpl`, and `Solver` mirrors
//! the outer `klee::Solver` class, which adds constant-expression fast
//! paths and builds `mustBeFalse`/`mayBeTrue`/`mayBeFalse` on top of
//! `computeTruth` via `Query::negateExpr` rather than asking every layer
//! to implement all four.

pub mod adapter;
pub mod caching;
pub mod dummy;
pub mod independent;
pub mod pool;
pub mod smtlib_log;
pub mod staged;
pub mod validating;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;

use crate::assignment::Assignment;
use crate::error::{Result, SolverError};
use crate::query::{Query, SolverRunStatus, Validity};

pub use crate::expr::ArrayRef;

/// The operations any decision-procedure layer must provide. A layer
/// that can't answer an operation at all should return a `Transport` (or
/// more specific) error rather than guessing.
pub trait SolverImpl {
    /// Is `query.expr` true in every model of `query.constraints`?
    fn compute_truth(&mut self, query: &Query) -> Result<bool>;

    /// The full three-valued validity of `query.expr`.
    fn compute_validity(&mut self, query: &Query) -> Result<Validity>;

    /// A concrete value `query.expr` can take under `query.constraints`.
    fn compute_value(&mut self, query: &Query) -> Result<crate::expr::Expr>;

    /// A satisfying assignment for every array in `objects`, or `None`
    /// if `query.full_constraints()` (`query.constraints` together with
    /// `query.expr` itself, asserted as-is and not negated) is
    /// unsatisfiable. Every caller in this crate passes a `True` literal
    /// for `expr` here — the original's own `computeInitialValues` query
    /// carries the same kind of inert placeholder (`ConstantExpr::alloc(0,
    /// Expr::Bool)`, negated internally before assertion, to the same
    /// net effect of asserting `constraints` alone) — so `expr` plays no
    /// role beyond satisfiability scaffolding; it is not the formula a
    /// counterexample is sought against.
    fn compute_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>>;

    /// Per-call timeout for the underlying decision procedure. Layers
    /// that don't talk to one directly (caching, partitioning) forward
    /// this to whatever they wrap; the default is a no-op so not every
    /// layer needs to implement it.
    fn set_timeout(&mut self, _timeout: Option<Duration>) {}

    /// Renders `query` in the underlying procedure's native format, for
    /// layers that support dumping (`SmtLibLoggingSolver`). Layers that
    /// don't support this return a `Configuration` error.
    fn constraint_log(&mut self, _query: &Query) -> Result<String> {
        Err(SolverError::configuration("this solver layer does not support constraint logging"))
    }

    /// The outcome of the last check this layer (or whatever it wraps)
    /// ran. A layer with nothing to report yet defaults to `Failure`,
    /// the original's most conservative default.
    fn get_operation_status_code(&self) -> SolverRunStatus {
        SolverRunStatus::Failure
    }
}

/// The outward-facing wrapper every caller holds. Adds the constant
/// fast path and derives `mustBeFalse`/`mayBeTrue`/`mayBeFalse` from
/// `mustBeTrue`, the way `klee::Solver` does atop `SolverImpl`.
pub struct Solver {
    impl_: Box<dyn SolverImpl>,
}

impl Solver {
    pub fn new(impl_: Box<dyn SolverImpl>) -> Self {
        Solver { impl_ }
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.impl_.set_timeout(timeout);
    }

    pub fn constraint_log(&mut self, query: &Query) -> Result<String> {
        self.impl_.constraint_log(query)
    }

    pub fn operation_status_code(&self) -> SolverRunStatus {
        self.impl_.get_operation_status_code()
    }

    pub fn evaluate(&mut self, query: &Query) -> Result<Validity> {
        if let Some(c) = query.expr.as_constant() {
            return Ok(if c != 0 { Validity::True } else { Validity::False });
        }
        self.impl_.compute_validity(query)
    }

    pub fn must_be_true(&mut self, query: &Query) -> Result<bool> {
        if let Some(c) = query.expr.as_constant() {
            return Ok(c != 0);
        }
        self.impl_.compute_truth(query)
    }

    pub fn must_be_false(&mut self, query: &Query) -> Result<bool> {
        self.must_be_true(&query.negate_expr())
    }

    pub fn may_be_true(&mut self, query: &Query) -> Result<bool> {
        Ok(!self.must_be_false(query)?)
    }

    pub fn may_be_false(&mut self, query: &Query) -> Result<bool> {
        Ok(!self.must_be_true(query)?)
    }

    pub fn get_value(&mut self, query: &Query) -> Result<crate::expr::Expr> {
        if query.expr.is_constant() {
            return Ok(query.expr.clone());
        }
        self.impl_.compute_value(query)
    }

    pub fn get_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        self.impl_.compute_initial_values(query, objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintSet;
    use crate::expr::{BOOL_WIDTH, Expr};
    use crate::solver::dummy::DummySolver;

    #[test]
    fn constant_query_bypasses_impl() {
        let mut solver = Solver::new(Box::new(DummySolver::new()));
        let q = Query::new(ConstraintSet::new(), Expr::constant(1, BOOL_WIDTH));
        assert_eq!(solver.must_be_true(&q).unwrap(), true);
        assert_eq!(solver.evaluate(&q).unwrap(), Validity::True);
    }

    #[test]
    fn non_constant_query_reaches_impl() {
        use crate::expr::{ArrayRef, UpdateList};

        let mut solver = Solver::new(Box::new(DummySolver::new()));
        let arr = ArrayRef::new_symbolic("x", 1);
        let byte = Expr::read(UpdateList::root(arr), Expr::constant(0, 32));
        let x = Expr::eq(byte, Expr::constant(2, 8));
        let q = Query::new(ConstraintSet::new(), x);
        assert!(solver.must_be_true(&q).is_err());
    }
}
