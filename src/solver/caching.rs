//! A query-result cache in front of another solver layer
//!
//! Grounded on `examples/original_source/lib/Solver/CachingSolver.cpp`:
//! `canonicalizeQuery` halves the cache's key space by storing the
//! smaller of `query.expr` and its negation (tracking whether it
//! negated), and `computeTruth`'s cache policy reinterprets a cached
//! `MustBeTrue`/`MustBeFalse` against `negationUsed` instead of
//! re-asking the wrapped solver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::assignment::Assignment;
use crate::constraints::ConstraintSet;
use crate::error::Result;
use crate::expr::{ArrayRef, Expr};
use crate::query::{PartialValidity, Query, SolverRunStatus, Validity};
use crate::solver::SolverImpl;

#[derive(Clone, PartialEq, Eq)]
struct CacheEntry {
    constraints: ConstraintSet,
    expr: Expr,
}

impl Hash for CacheEntry {
    /// The key's hash XORs the query-expression hash with each
    /// constraint's hash, order-insensitive (`spec.md` §4.4). Equality
    /// stays order-sensitive (derived from `ConstraintSet`'s `Vec`
    /// comparison), so two permutations of the same constraints collide
    /// on hash but are never conflated by the map's lookup — the engine's
    /// constraint order is preserved through the cache regardless.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut combined = self.expr.structural_hash();
        for c in self.constraints.iter() {
            combined ^= c.structural_hash();
        }
        state.write_u64(combined);
    }
}

pub struct CachingSolver {
    inner: Box<dyn SolverImpl>,
    cache: RefCell<HashMap<CacheEntry, PartialValidity>>,
    hits: RefCell<u64>,
    misses: RefCell<u64>,
}

impl CachingSolver {
    pub fn new(inner: Box<dyn SolverImpl>) -> Self {
        CachingSolver { inner, cache: RefCell::new(HashMap::new()), hits: RefCell::new(0), misses: RefCell::new(0) }
    }

    pub fn hits(&self) -> u64 {
        *self.hits.borrow()
    }

    pub fn misses(&self) -> u64 {
        *self.misses.borrow()
    }

    /// Picks the smaller of `query.expr` and its negation as the cache
    /// key, so a query and its logical opposite share one cache slot.
    fn canonicalize(query: &Query) -> (Query, bool) {
        let negated = Expr::is_zero(query.expr.clone());
        if negated < query.expr {
            (query.with_expr(negated), true)
        } else {
            (query.clone(), false)
        }
    }

    fn lookup(&self, canonical: &Query) -> Option<PartialValidity> {
        let key = CacheEntry { constraints: canonical.constraints.clone(), expr: canonical.expr.clone() };
        self.cache.borrow().get(&key).copied()
    }

    fn insert(&self, canonical: &Query, validity: PartialValidity) {
        let key = CacheEntry { constraints: canonical.constraints.clone(), expr: canonical.expr.clone() };
        self.cache.borrow_mut().insert(key, validity);
    }
}

impl SolverImpl for CachingSolver {
    fn compute_truth(&mut self, query: &Query) -> Result<bool> {
        let (canonical, negation_used) = Self::canonicalize(query);

        // The stored value is keyed to the canonical (possibly negated)
        // query; translate it back to `query`'s own perspective before
        // acting on it.
        let stored = self.lookup(&canonical);
        let from_querys_view = stored.map(|v| if negation_used { v.negate() } else { v });

        // A cached `MayBeTrue` only tells us a model exists showing the
        // query *can* be true, not that it must be — it still needs
        // confirming against the wrapped solver.
        if let Some(known) = from_querys_view {
            if known != PartialValidity::MayBeTrue {
                *self.hits.borrow_mut() += 1;
                return Ok(known == PartialValidity::MustBeTrue);
            }
        }
        *self.misses.borrow_mut() += 1;

        let is_valid = self.inner.compute_truth(query)?;

        let refined = if is_valid {
            PartialValidity::MustBeTrue
        } else if from_querys_view == Some(PartialValidity::MayBeTrue) {
            PartialValidity::TrueOrFalse
        } else {
            PartialValidity::MayBeFalse
        };

        self.insert(&canonical, if negation_used { refined.negate() } else { refined });
        Ok(is_valid)
    }

    fn compute_validity(&mut self, _query: &Query) -> Result<Validity> {
        // The original's CachingSolver::computeValidity asserts unreached
        // (`assert(0 && "FIXME: Broken.")`) — full three-valued validity
        // caching is left open; only computeTruth caching is supported.
        unimplemented!("CachingSolver::compute_validity is not implemented, matching the original")
    }

    fn compute_value(&mut self, query: &Query) -> Result<Expr> {
        self.inner.compute_value(query)
    }

    fn compute_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        self.inner.compute_initial_values(query, objects)
    }

    fn set_timeout(&mut self, timeout: Option<std::time::Duration>) {
        self.inner.set_timeout(timeout);
    }

    fn constraint_log(&mut self, query: &Query) -> Result<String> {
        self.inner.constraint_log(query)
    }

    fn get_operation_status_code(&self) -> SolverRunStatus {
        self.inner.get_operation_status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArrayRef as Arr, UpdateList, BOOL_WIDTH};
    use crate::solver::dummy::DummySolver;

    struct CountingTrueSolver {
        calls: u32,
    }

    impl SolverImpl for CountingTrueSolver {
        fn compute_truth(&mut self, _query: &Query) -> Result<bool> {
            self.calls += 1;
            Ok(true)
        }
        fn compute_validity(&mut self, _query: &Query) -> Result<Validity> {
            unreachable!()
        }
        fn compute_value(&mut self, _query: &Query) -> Result<Expr> {
            unreachable!()
        }
        fn compute_initial_values(
            &mut self,
            _query: &Query,
            _objects: &[ArrayRef],
        ) -> Result<Option<Assignment>> {
            unreachable!()
        }
    }

    fn symbolic_bool_expr() -> Expr {
        let arr = Arr::new_symbolic("x", 1);
        let byte = Expr::read(UpdateList::root(arr), Expr::constant(0, 32));
        Expr::eq(byte, Expr::constant(1, 8))
    }

    #[test]
    fn repeated_query_hits_cache() {
        let mut solver = CachingSolver::new(Box::new(CountingTrueSolver { calls: 0 }));
        let q = Query::new(ConstraintSet::new(), symbolic_bool_expr());
        assert!(solver.compute_truth(&q).unwrap());
        assert!(solver.compute_truth(&q).unwrap());
        assert_eq!(solver.misses(), 1);
        assert_eq!(solver.hits(), 1);
    }

    #[test]
    fn negated_query_reuses_cache_entry() {
        let mut solver = CachingSolver::new(Box::new(CountingTrueSolver { calls: 0 }));
        let expr = symbolic_bool_expr();
        let q = Query::new(ConstraintSet::new(), expr.clone());
        let negated_q = q.negate_expr();

        assert!(solver.compute_truth(&q).unwrap());
        // The wrapped solver always reports "true" for whatever it's
        // asked, including the negation, so this is a cache hit, not a
        // second call — but the point under test is that canonicalize
        // routes both queries to the same cache slot.
        let _ = solver.compute_truth(&negated_q);
        assert!(solver.misses() <= 2);
    }

    #[test]
    fn compute_validity_is_unimplemented() {
        let mut solver = CachingSolver::new(Box::new(DummySolver::new()));
        let q = Query::new(ConstraintSet::new(), Expr::constant(1, BOOL_WIDTH));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| solver.compute_validity(&q)));
        assert!(result.is_err());
    }

    // Property test for invariant 4 (`spec.md` §8): canonicalizing a query
    // and canonicalizing its negation must land on the same key with
    // opposite `negation_used` flags, for any boolean expression built from
    // reads/constants/And/Or/Not.
    mod canonicalize_properties {
        use super::*;
        use crate::expr::{ArrayRef as Arr, UpdateList};
        use proptest::prelude::*;

        fn atom(offset: u32, value: u64) -> Expr {
            let arr = Arr::new_symbolic("p", 4);
            let byte = Expr::read(UpdateList::root(arr), Expr::constant(offset as u64, 32));
            Expr::eq(byte, Expr::constant(value, 8))
        }

        fn arb_bool_expr() -> impl Strategy<Value = Expr> {
            let leaf = (0u32..4, 0u64..4).prop_map(|(o, v)| atom(o, v));
            leaf.prop_recursive(3, 16, 4, |inner| {
                prop_oneof![
                    inner.clone().prop_map(Expr::not),
                    (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::and(a, b)),
                    (inner.clone(), inner).prop_map(|(a, b)| Expr::or(a, b)),
                ]
            })
        }

        proptest! {
            #[test]
            fn negation_shares_the_same_canonical_key(e in arb_bool_expr()) {
                let q = Query::new(ConstraintSet::new(), e);
                let negated_q = q.negate_expr();

                let (canon_q, negated_by_q) = CachingSolver::canonicalize(&q);
                let (canon_neg, negated_by_neg) = CachingSolver::canonicalize(&negated_q);

                prop_assert_eq!(canon_q.expr, canon_neg.expr);
                prop_assert_eq!(canon_q.constraints, canon_neg.constraints);
                prop_assert_ne!(negated_by_q, negated_by_neg);
            }
        }
    }
}
