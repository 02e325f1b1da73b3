//! A query: a path condition plus the expression being asked about
//!
//! Grounded on `examples/original_source/lib/Solver/Solver.cpp`'s
//! `Query` (constraints + expr, `negateExpr`, `dump`) and
//! `IncompleteSolver.cpp`'s `negatePartialValidity`/`negateValidity` for
//! the two validity enums' negation tables.

use std::fmt;

use crate::constraints::ConstraintSet;
use crate::expr::Expr;

/// A path condition together with the expression a solver operation asks
/// about. Every `SolverImpl` operation takes one of these.
#[derive(Clone, Debug)]
pub struct Query {
    pub constraints: ConstraintSet,
    pub expr: Expr,
}

impl Query {
    pub fn new(constraints: ConstraintSet, expr: Expr) -> Self {
        Query { constraints, expr }
    }

    /// A query asking the negation of this one's expression, same
    /// constraints — `Query::negateExpr` in the original.
    pub fn negate_expr(&self) -> Self {
        Query { constraints: self.constraints.clone(), expr: Expr::is_zero(self.expr.clone()) }
    }

    /// Same constraints, a different expression under test.
    pub fn with_expr(&self, expr: Expr) -> Self {
        Query { constraints: self.constraints.clone(), expr }
    }

    /// The constraint set extended with this query's own expression —
    /// what a solver needs to check for pure satisfiability.
    pub fn full_constraints(&self) -> ConstraintSet {
        self.constraints.with(self.expr.clone())
    }

    /// `constraints` with the negated `expr` appended — the sequence
    /// `internalRun` pushes onto the external procedure's assertion stack
    /// to decide a truth/validity query (`spec.md` §4.6 step 3, §8
    /// invariant 5). Exposed so the pool can predict the exact target an
    /// adapter's stack will reach, for LCP-based dispatch.
    pub fn truth_assertion_target(&self) -> Vec<Expr> {
        let mut target: Vec<Expr> = self.constraints.as_slice().to_vec();
        target.push(Expr::is_zero(self.expr.clone()));
        target
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "query {{")?;
        for c in self.constraints.iter() {
            writeln!(f, "  assume {:?}", c)?;
        }
        writeln!(f, "  check  {:?}", self.expr)?;
        write!(f, "}}")
    }
}

/// The three-valued answer to "is `query.expr` true in every model of
/// `query.constraints`?" that a complete decision procedure gives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validity {
    True,
    False,
    Unknown,
}

impl Validity {
    pub fn negate(self) -> Self {
        match self {
            Validity::True => Validity::False,
            Validity::False => Validity::True,
            Validity::Unknown => Validity::Unknown,
        }
    }
}

/// The six-valued answer an *incomplete* decision procedure gives — it
/// may only be confident enough to report a guess backed by one model,
/// not a proof; `MayBeTrue`/`MayBeFalse` record that a cached guess still
/// needs confirming, and `TrueOrFalse` records that both have already
/// been confirmed possible. Mirrors `klee::Solver::PartialValidity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartialValidity {
    MustBeTrue,
    MustBeFalse,
    MayBeTrue,
    MayBeFalse,
    TrueOrFalse,
    Unknown,
}

impl PartialValidity {
    /// `negatePartialValidity` in the original: flips the sign of a
    /// partial result without upgrading or downgrading its confidence.
    pub fn negate(self) -> Self {
        match self {
            PartialValidity::MustBeTrue => PartialValidity::MustBeFalse,
            PartialValidity::MustBeFalse => PartialValidity::MustBeTrue,
            PartialValidity::MayBeTrue => PartialValidity::MayBeFalse,
            PartialValidity::MayBeFalse => PartialValidity::MayBeTrue,
            PartialValidity::TrueOrFalse => PartialValidity::TrueOrFalse,
            PartialValidity::Unknown => PartialValidity::Unknown,
        }
    }

    /// Widens a partial result to the complete `Validity` scale. A
    /// solver that can only ever report `MustBe*`/`TrueOrFalse`/`Unknown`
    /// (never an unconfirmed `MayBe*` guess) uses this directly as its
    /// `Validity` answer.
    pub fn to_validity(self) -> Option<Validity> {
        match self {
            PartialValidity::MustBeTrue => Some(Validity::True),
            PartialValidity::MustBeFalse => Some(Validity::False),
            PartialValidity::TrueOrFalse | PartialValidity::Unknown => Some(Validity::Unknown),
            PartialValidity::MayBeTrue | PartialValidity::MayBeFalse => None,
        }
    }
}

/// The external procedure's own verdict on the last check it ran — not a
/// property of the query, but of the run itself; mirrors
/// `SolverImpl::SolverRunStatus` (`spec.md` §9's capability record).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverRunStatus {
    SuccessSolvable,
    SuccessUnsolvable,
    Failure,
    Timeout,
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintSet;
    use crate::expr::BOOL_WIDTH;

    #[test]
    fn negate_expr_wraps_in_is_zero() {
        let q = Query::new(ConstraintSet::new(), Expr::constant(1, BOOL_WIDTH));
        let negated = q.negate_expr();
        assert_ne!(negated.expr, q.expr);
        assert_eq!(negated.constraints, q.constraints);
    }

    #[test]
    fn partial_validity_negation_table() {
        assert_eq!(PartialValidity::MustBeTrue.negate(), PartialValidity::MustBeFalse);
        assert_eq!(PartialValidity::MayBeTrue.negate(), PartialValidity::MayBeFalse);
        assert_eq!(PartialValidity::TrueOrFalse.negate(), PartialValidity::TrueOrFalse);
        assert_eq!(PartialValidity::Unknown.negate(), PartialValidity::Unknown);
    }

    #[test]
    fn validity_negation_is_involution() {
        for v in [Validity::True, Validity::False, Validity::Unknown] {
            assert_eq!(v.negate().negate(), v);
        }
    }
}
