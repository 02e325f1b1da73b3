//! The engine-facing facade: constant fast paths, optional simplification,
//! per-call timing, and `getRange`
//!
//! Grounded on `examples/original_source/lib/Core/TimingSolver.cpp` (the
//! six wrapped operations, the `ConstantExpr` fast path ahead of the
//! timer, `simplifyExprs`) and `examples/original_source/lib/Solver/Solver.cpp`'s
//! `getRange` (the three nested binary searches). `examples/original_source`
//! threads two constraint sets through every call — `constraints` (what
//! gets simplified against and solved) and `unsimplified` (the engine's
//! real, unsimplified path condition, carried only so the pool's
//! incremental stacks track the engine's actual history rather than a
//! simplified stand-in). This crate's `Query` has a single constraint
//! field, so `TimingSolver` resolves that by building the `Query` handed
//! to the wrapped stack from `unsimplified` (pool routing needs the real
//! path condition) while simplifying `expr` against `constraints`.

use crate::assignment::Assignment;
use crate::constraints::ConstraintSet;
use crate::error::{Result, SolverError};
use crate::expr::{Expr, Width, BOOL_WIDTH};
use crate::metadata::{QueryTimer, SolverQueryMetaData};
use crate::query::{Query, Validity};
use crate::solver::{ArrayRef, Solver};

/// A minimal, constraint-literal simplifier: if `expr` (or its negation)
/// appears verbatim as a conjunct of `constraints`, it's replaced by the
/// corresponding boolean constant. This is deliberately not a full
/// rewrite pass — the expression language is scaffolding (`spec.md` §1
/// keeps it an external collaborator), so the simplifier only needs to
/// demonstrate the facade's "simplify before descent" contract, not
/// reimplement a constraint solver's own algebra.
fn simplify_expr(constraints: &ConstraintSet, expr: &Expr) -> Expr {
    if expr.is_constant() {
        return expr.clone();
    }
    let negated = Expr::is_zero(expr.clone());
    for c in constraints.iter() {
        if c == expr {
            return Expr::constant(1, expr.width());
        }
        if *c == negated {
            return Expr::constant(0, expr.width());
        }
    }
    expr.clone()
}

fn max_value_of_n_bits(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Wraps a composed `Solver` with the timing/simplification/`getRange`
/// behavior the engine actually calls into.
pub struct TimingSolver {
    solver: Solver,
    simplify: bool,
}

impl TimingSolver {
    pub fn new(solver: Solver) -> Self {
        TimingSolver { solver, simplify: true }
    }

    pub fn with_simplify(solver: Solver, simplify: bool) -> Self {
        TimingSolver { solver, simplify }
    }

    fn build_query(&self, constraints: &ConstraintSet, unsimplified: &ConstraintSet, expr: Expr) -> Query {
        let expr = if self.simplify { simplify_expr(constraints, &expr) } else { expr };
        Query::new(unsimplified.clone(), expr)
    }

    pub fn evaluate(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<Validity> {
        if let Some(c) = expr.as_constant() {
            return Ok(if c != 0 { Validity::True } else { Validity::False });
        }
        let _timer = QueryTimer::start(meta);
        let query = self.build_query(constraints, unsimplified, expr.clone());
        self.solver.evaluate(&query)
    }

    pub fn must_be_true(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<bool> {
        if let Some(c) = expr.as_constant() {
            return Ok(c != 0);
        }
        let _timer = QueryTimer::start(meta);
        let query = self.build_query(constraints, unsimplified, expr.clone());
        // A timed-out check is surfaced as `false` rather than an error —
        // the caller gets an answer it can act on (and retry later with
        // different parameters) instead of a hard failure (`spec.md` §7).
        match self.solver.must_be_true(&query) {
            Err(SolverError::Timeout { .. }) => Ok(false),
            other => other,
        }
    }

    pub fn must_be_false(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<bool> {
        self.must_be_true(constraints, unsimplified, &Expr::is_zero(expr.clone()), meta)
    }

    pub fn may_be_true(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<bool> {
        Ok(!self.must_be_false(constraints, unsimplified, expr, meta)?)
    }

    pub fn may_be_false(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<bool> {
        Ok(!self.must_be_true(constraints, unsimplified, expr, meta)?)
    }

    pub fn get_value(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<Expr> {
        if expr.is_constant() {
            return Ok(expr.clone());
        }
        let _timer = QueryTimer::start(meta);
        let query = self.build_query(constraints, unsimplified, expr.clone());
        self.solver.get_value(&query)
    }

    /// `objects` empty short-circuits without issuing a query, matching
    /// the original. The query's own expression is a fixed `true` rather
    /// than the original's placeholder `false`: this stack's
    /// `Query::full_constraints` folds `expr` into what must hold, so a
    /// neutral literal is required here, not merely an unused one.
    pub fn get_initial_values(
        &mut self,
        unsimplified: &ConstraintSet,
        objects: &[ArrayRef],
        meta: &mut SolverQueryMetaData,
    ) -> Result<Option<Assignment>> {
        if objects.is_empty() {
            return Ok(Some(Assignment::new()));
        }
        let _timer = QueryTimer::start(meta);
        let query = Query::new(unsimplified.clone(), Expr::constant(1, BOOL_WIDTH));
        self.solver.get_initial_values(&query, objects)
    }

    pub fn get_range(
        &mut self,
        constraints: &ConstraintSet,
        unsimplified: &ConstraintSet,
        expr: &Expr,
        meta: &mut SolverQueryMetaData,
    ) -> Result<(Expr, Expr)> {
        let _timer = QueryTimer::start(meta);
        let width = expr.width();

        if width == BOOL_WIDTH {
            let query = self.build_query(constraints, unsimplified, expr.clone());
            let (lo, hi) = match self.solver.evaluate(&query)? {
                Validity::True => (1, 1),
                Validity::False => (0, 0),
                Validity::Unknown => (0, 1),
            };
            return Ok((Expr::constant(lo, width), Expr::constant(hi, width)));
        }

        if let Some(c) = expr.as_constant() {
            return Ok((Expr::constant(c, width), Expr::constant(c, width)));
        }

        let mut lo: u64 = 0;
        let mut hi: u64 = width as u64;
        let mut bits: u64 = 0;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let shifted = Expr::lshr(expr.clone(), Expr::constant(mid, width));
            let test = Expr::eq(shifted, Expr::constant(0, width));
            let query = Query::new(unsimplified.clone(), test);
            if self.solver.must_be_true(&query)? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
            bits = lo;
        }

        let zero_test = Query::new(unsimplified.clone(), Expr::eq(expr.clone(), Expr::constant(0, width)));
        let may_be_zero = self.solver.may_be_true(&zero_test)?;

        let min = if may_be_zero {
            0
        } else {
            let (mut lo, mut hi) = (0u64, max_value_of_n_bits(bits as Width));
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                let test = Expr::ule(expr.clone(), Expr::constant(mid, width));
                let query = Query::new(unsimplified.clone(), test);
                if self.solver.may_be_true(&query)? {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            lo
        };

        let (mut lo, mut hi) = (min, max_value_of_n_bits(bits as Width));
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let test = Expr::ule(expr.clone(), Expr::constant(mid, width));
            let query = Query::new(unsimplified.clone(), test);
            if self.solver.must_be_true(&query)? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        let max = lo;

        Ok((Expr::constant(min, width), Expr::constant(max, width)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::UpdateList;
    use crate::solver::test_support::ModelSolver;
    use crate::solver::validating::ValidatingSolver;

    fn symbolic_byte(name: &str) -> (ArrayRef, Expr) {
        let arr = ArrayRef::new_symbolic(name, 1);
        let byte = Expr::read(UpdateList::root(arr.clone()), Expr::constant(0, 32));
        (arr, byte)
    }

    #[test]
    fn constant_evaluate_skips_timing() {
        let mut meta = SolverQueryMetaData::new();
        let mut ts = TimingSolver::new(Solver::new(Box::new(crate::solver::dummy::DummySolver::new())));
        let empty = ConstraintSet::new();
        let v = ts.evaluate(&empty, &empty, &Expr::constant(1, BOOL_WIDTH), &mut meta).unwrap();
        assert_eq!(v, Validity::True);
        assert_eq!(meta.query_cost, std::time::Duration::ZERO);
    }

    #[test]
    fn must_be_false_is_must_be_true_of_negation() {
        let mut meta = SolverQueryMetaData::new();
        let inner = Box::new(crate::solver::independent::IndependentSolver::new(Box::new(ModelSolver)));
        let mut ts = TimingSolver::new(Solver::new(inner));

        let (_arr, byte) = symbolic_byte("x");
        let constraints = ConstraintSet::from_vec(vec![Expr::eq(byte.clone(), Expr::constant(5, 8))]);
        let expr = Expr::eq(byte, Expr::constant(5, 8));

        let must_true = ts.must_be_true(&constraints, &constraints, &expr, &mut meta).unwrap();
        let must_false = ts.must_be_false(&constraints, &constraints, &expr, &mut meta).unwrap();
        assert_ne!(must_true, must_false);
    }

    #[test]
    fn get_initial_values_short_circuits_on_no_objects() {
        let mut meta = SolverQueryMetaData::new();
        let oracle = Box::new(ValidatingSolver::new(Box::new(ModelSolver), Box::new(ModelSolver)));
        let mut ts = TimingSolver::new(Solver::new(oracle));
        let empty = ConstraintSet::new();
        let result = ts.get_initial_values(&empty, &[], &mut meta).unwrap();
        assert!(result.unwrap().arrays().next().is_none());
    }

    #[test]
    fn get_range_on_bool_width_is_single_evaluate() {
        let mut meta = SolverQueryMetaData::new();
        let mut ts = TimingSolver::new(Solver::new(Box::new(crate::solver::dummy::DummySolver::new())));
        let empty = ConstraintSet::new();
        let (lo, hi) = ts.get_range(&empty, &empty, &Expr::constant(1, BOOL_WIDTH), &mut meta).unwrap();
        assert_eq!(lo.as_constant(), Some(1));
        assert_eq!(hi.as_constant(), Some(1));
    }

    #[test]
    fn get_range_on_constant_width_is_trivial() {
        let mut meta = SolverQueryMetaData::new();
        let mut ts = TimingSolver::new(Solver::new(Box::new(crate::solver::dummy::DummySolver::new())));
        let empty = ConstraintSet::new();
        let (lo, hi) = ts.get_range(&empty, &empty, &Expr::constant(42, 8), &mut meta).unwrap();
        assert_eq!(lo.as_constant(), Some(42));
        assert_eq!(hi.as_constant(), Some(42));
    }

    #[test]
    fn get_range_brackets_constrained_byte() {
        let mut meta = SolverQueryMetaData::new();
        let inner = Box::new(crate::solver::independent::IndependentSolver::new(Box::new(ModelSolver)));
        let mut ts = TimingSolver::new(Solver::new(inner));

        let (_arr, byte) = symbolic_byte("y");
        let constraints =
            ConstraintSet::from_vec(vec![Expr::eq(byte.clone(), Expr::constant(5, 8))]);
        let (lo, hi) = ts.get_range(&constraints, &constraints, &byte, &mut meta).unwrap();
        assert_eq!(lo.as_constant(), Some(5));
        assert_eq!(hi.as_constant(), Some(5));
    }
}
