//! The incremental Z3 adapter: the only layer that talks to an actual
//! external decision procedure
//!
//! Grounded on `examples/renovate-bot-GoogleCloudPlatform-_-aether`'s
//! `verification/solver_z3.rs` for the `z3` crate idiom (`Config`,
//! `Context`, `Solver`, `ast::{Bool, BV, Array}`, tree-walk translation,
//! model extraction), generalized from that file's int/real/bool
//! language to the bit-vector/array language `src/expr.rs` defines, and
//! on `examples/original_source/lib/Solver/Z3Solver.cpp` for the
//! SAT/UNSAT/UNDEF response mapping, the `raise(SIGINT)` interrupt
//! re-raise, and the model-validation self-check. The mirrored
//! assertion-stack / longest-common-prefix push-pop protocol is this
//! crate's own addition (`spec.md` §4.6), since the original
//! `Z3Solver.cpp` recreates a fresh solver per query rather than reusing
//! one incrementally — that reuse is instead what
//! `Z3PoolingSolver.{h,cpp}` 's pool exists to manage, generalized here
//! into a single adapter's own stack so `SolverPool` (§4.7) has
//! something stateful to dispatch onto.

use std::collections::HashMap;
use std::time::Duration;

use z3::ast::{Array as Z3Array, Ast, Bool as Z3Bool, Dynamic as Z3Dynamic, BV as Z3Bv};
use z3::{Config, Context, Params, SatResult, Solver as Z3NativeSolver, Sort};

use crate::assignment::Assignment;
use crate::error::{Result, SolverError};
use crate::expr::{ArrayRef, Expr, ExprKind, UpdateList, BOOL_WIDTH};
use crate::query::{Query, SolverRunStatus, Validity};
use crate::solver::SolverImpl;

/// Index width assumed for every array in this crate — KLEE arrays are
/// addressed by 32-bit byte offset, and nothing in `src/expr.rs` varies
/// it, so the adapter doesn't need to track it per array.
const INDEX_WIDTH: u32 = 32;

pub struct Z3Adapter {
    ctx: &'static Context,
    solver: Z3NativeSolver<'static>,
    /// The constraints currently asserted in `solver`'s live frames, in
    /// push order — mirrors `spec.md` §4.6's "assertion stack".
    assertion_stack: Vec<Expr>,
    array_cache: HashMap<ArrayRef, Z3Array<'static>>,
    /// Expression -> z3 AST, scoped to a single top-level query
    /// (`spec.md` §4.6 step 6, §5's "builder translation caches are
    /// per-adapter and reset after each query to bound memory").
    translation_cache: HashMap<Expr, Z3Dynamic<'static>>,
    timeout: Option<Duration>,
    validate_models: bool,
    last_status: SolverRunStatus,
}

impl Z3Adapter {
    pub fn new() -> Self {
        let cfg = Config::new();
        let ctx: &'static Context = Box::leak(Box::new(Context::new(&cfg)));
        let solver = Z3NativeSolver::new(ctx);
        Self::from_parts(ctx, solver)
    }

    /// `z3-custom-tactic` (`spec.md` §6): builds the adapter's solver
    /// from a named tactic (e.g. `array_ackermannize_to_qfbv`) instead of
    /// Z3's own tactic selection.
    pub fn with_tactic(tactic: &str) -> Self {
        let cfg = Config::new();
        let ctx: &'static Context = Box::leak(Box::new(Context::new(&cfg)));
        let solver = z3::Tactic::new(ctx, tactic).solver();
        Self::from_parts(ctx, solver)
    }

    fn from_parts(ctx: &'static Context, solver: Z3NativeSolver<'static>) -> Self {
        Z3Adapter {
            ctx,
            solver,
            assertion_stack: Vec::new(),
            array_cache: HashMap::new(),
            translation_cache: HashMap::new(),
            timeout: None,
            validate_models: false,
            last_status: SolverRunStatus::Failure,
        }
    }

    pub fn with_validate_models(mut self, enable: bool) -> Self {
        self.validate_models = enable;
        self
    }

    /// Clears the per-query translation cache. Expression sharing is
    /// only ever exploited within a single query's translation; called
    /// unconditionally at the end of every top-level operation
    /// regardless of its outcome.
    fn clear_translation_cache(&mut self) {
        self.translation_cache.clear();
    }

    fn apply_timeout(&self) {
        if let Some(timeout) = self.timeout {
            let mut params = Params::new(self.ctx);
            params.set_u32("timeout", timeout.as_millis().min(u32::MAX as u128) as u32);
            self.solver.set_params(&params);
        }
    }

    /// Pops frames back to the longest shared prefix with `target`, then
    /// pushes the remaining suffix — the LCP reuse `spec.md` §4.6
    /// describes, so two queries sharing a path prefix don't re-assert
    /// shared constraints.
    fn sync_stack(&mut self, target: &[Expr]) {
        let lcp = self.assertion_stack.iter().zip(target.iter()).take_while(|(a, b)| a == b).count();

        if lcp < self.assertion_stack.len() {
            self.solver.pop((self.assertion_stack.len() - lcp) as u32);
            self.assertion_stack.truncate(lcp);
        }

        for constraint in &target[lcp..] {
            let z3_bool = self.translate_bool(constraint);
            self.solver.push();
            self.solver.assert(&z3_bool);
            self.assertion_stack.push(constraint.clone());
        }
    }

    pub fn assertion_stack_len(&self) -> usize {
        self.assertion_stack.len()
    }

    pub fn assertion_stack(&self) -> &[Expr] {
        &self.assertion_stack
    }

    fn run_check(&mut self) -> Result<SatResult> {
        self.apply_timeout();
        match self.solver.check() {
            SatResult::Sat => {
                self.last_status = SolverRunStatus::SuccessSolvable;
                Ok(SatResult::Sat)
            }
            SatResult::Unsat => {
                self.last_status = SolverRunStatus::SuccessUnsolvable;
                Ok(SatResult::Unsat)
            }
            SatResult::Unknown => {
                let reason = self.solver.get_reason_unknown().unwrap_or_default();
                if reason.contains("interrupt") {
                    self.last_status = SolverRunStatus::Interrupted;
                    unsafe { libc::raise(libc::SIGINT) };
                    Err(SolverError::Interrupted)
                } else if reason.contains("timeout")
                    || reason.contains("canceled")
                    || reason.contains("resource limits reached")
                {
                    self.last_status = SolverRunStatus::Timeout;
                    Err(SolverError::Timeout { elapsed_ms: self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0) })
                } else {
                    self.last_status = SolverRunStatus::Failure;
                    Err(SolverError::transport(format!("z3 returned unknown: {reason}")))
                }
            }
        }
    }

    fn array_z3(&mut self, array: &ArrayRef) -> Z3Array<'static> {
        if let Some(existing) = self.array_cache.get(array) {
            return existing.clone();
        }
        let domain = Sort::bitvector(self.ctx, INDEX_WIDTH);
        let range = Sort::bitvector(self.ctx, 8);
        let z3_array = if array.is_constant_array() {
            let default = Z3Bv::from_u64(self.ctx, 0, 8);
            let mut built = Z3Array::const_array(self.ctx, &domain, &default);
            let mut offset = 0u32;
            while let Some(byte) = array.constant_byte(offset) {
                let index = Z3Bv::from_u64(self.ctx, offset as u64, INDEX_WIDTH);
                let value = Z3Bv::from_u64(self.ctx, byte as u64, 8);
                built = built.store(&index, &value);
                offset += 1;
            }
            built
        } else {
            Z3Array::new_const(self.ctx, array.name().to_string(), &domain, &range)
        };
        self.array_cache.insert(array.clone(), z3_array.clone());
        z3_array
    }

    fn update_list_z3(&mut self, updates: &UpdateList) -> Z3Array<'static> {
        let mut array = self.array_z3(&updates.root);
        for (index, value) in updates.writes.iter().rev() {
            let idx = self.translate_bv(index);
            let val = self.translate_bv(value);
            array = array.store(&idx, &val);
        }
        array
    }

    fn translate(&mut self, expr: &Expr) -> Z3Dynamic<'static> {
        if let Some(cached) = self.translation_cache.get(expr) {
            return cached.clone();
        }
        let result = self.translate_uncached(expr);
        self.translation_cache.insert(expr.clone(), result.clone());
        result
    }

    fn translate_uncached(&mut self, expr: &Expr) -> Z3Dynamic<'static> {
        match expr.kind() {
            ExprKind::Constant(v) => {
                if expr.width() == BOOL_WIDTH {
                    Z3Bool::from_bool(self.ctx, *v != 0).into()
                } else {
                    Z3Bv::from_u64(self.ctx, *v, expr.width()).into()
                }
            }
            ExprKind::Read(updates, index) => {
                let array = self.update_list_z3(updates);
                let idx = self.translate_bv(index);
                array.select(&idx)
            }
            ExprKind::Not(e) => {
                if e.width() == BOOL_WIDTH {
                    self.translate_bool(e).not().into()
                } else {
                    self.translate_bv(e).bvnot().into()
                }
            }
            ExprKind::And(a, b) => {
                if a.width() == BOOL_WIDTH {
                    let (x, y) = (self.translate_bool(a), self.translate_bool(b));
                    Z3Bool::and(self.ctx, &[&x, &y]).into()
                } else {
                    self.translate_bv(a).bvand(&self.translate_bv(b)).into()
                }
            }
            ExprKind::Or(a, b) => {
                if a.width() == BOOL_WIDTH {
                    let (x, y) = (self.translate_bool(a), self.translate_bool(b));
                    Z3Bool::or(self.ctx, &[&x, &y]).into()
                } else {
                    self.translate_bv(a).bvor(&self.translate_bv(b)).into()
                }
            }
            ExprKind::Xor(a, b) => {
                if a.width() == BOOL_WIDTH {
                    let (x, y) = (self.translate_bool(a), self.translate_bool(b));
                    x.xor(&y).into()
                } else {
                    self.translate_bv(a).bvxor(&self.translate_bv(b)).into()
                }
            }
            ExprKind::Add(a, b) => self.translate_bv(a).bvadd(&self.translate_bv(b)).into(),
            ExprKind::Sub(a, b) => self.translate_bv(a).bvsub(&self.translate_bv(b)).into(),
            ExprKind::Mul(a, b) => self.translate_bv(a).bvmul(&self.translate_bv(b)).into(),
            ExprKind::UDiv(a, b) => self.translate_bv(a).bvudiv(&self.translate_bv(b)).into(),
            ExprKind::SDiv(a, b) => self.translate_bv(a).bvsdiv(&self.translate_bv(b)).into(),
            ExprKind::URem(a, b) => self.translate_bv(a).bvurem(&self.translate_bv(b)).into(),
            ExprKind::SRem(a, b) => self.translate_bv(a).bvsrem(&self.translate_bv(b)).into(),
            ExprKind::Shl(a, b) => self.translate_bv(a).bvshl(&self.translate_bv(b)).into(),
            ExprKind::LShr(a, b) => self.translate_bv(a).bvlshr(&self.translate_bv(b)).into(),
            ExprKind::AShr(a, b) => self.translate_bv(a).bvashr(&self.translate_bv(b)).into(),
            ExprKind::Eq(a, b) => self.translate(a)._eq(&self.translate(b)).into(),
            ExprKind::Ult(a, b) => self.translate_bv(a).bvult(&self.translate_bv(b)).into(),
            ExprKind::Ule(a, b) => self.translate_bv(a).bvule(&self.translate_bv(b)).into(),
            ExprKind::Slt(a, b) => self.translate_bv(a).bvslt(&self.translate_bv(b)).into(),
            ExprKind::Sle(a, b) => self.translate_bv(a).bvsle(&self.translate_bv(b)).into(),
            ExprKind::Select(c, t, f) => {
                let cond = self.translate_bool(c);
                let then_ = self.translate(t);
                let else_ = self.translate(f);
                cond.ite(&then_, &else_)
            }
            ExprKind::ZExt(e, w) => self.translate_bv(e).zero_ext(w - e.width()).into(),
            ExprKind::SExt(e, w) => self.translate_bv(e).sign_ext(w - e.width()).into(),
            ExprKind::Extract(e, off, w) => self.translate_bv(e).extract(off + w - 1, *off).into(),
            ExprKind::Concat(hi, lo) => self.translate_bv(hi).concat(&self.translate_bv(lo)).into(),
        }
    }

    fn translate_bool(&mut self, expr: &Expr) -> Z3Bool<'static> {
        self.translate(expr).as_bool().expect("boolean-width expression must translate to a z3 Bool")
    }

    fn translate_bv(&mut self, expr: &Expr) -> Z3Bv<'static> {
        self.translate(expr).as_bv().expect("non-boolean expression must translate to a z3 BV")
    }

    fn extract_assignment(&mut self, objects: &[ArrayRef]) -> Result<Assignment> {
        let model = self
            .solver
            .get_model()
            .ok_or_else(|| SolverError::invariant("z3 reported SAT but produced no model"))?;

        let mut assignment = Assignment::new();
        for obj in objects {
            let array_ast = self.array_z3(obj);
            let mut bytes = Vec::with_capacity(obj.size() as usize);
            for offset in 0..obj.size() {
                let idx = Z3Bv::from_u64(self.ctx, offset as u64, INDEX_WIDTH);
                let selected = array_ast.select(&idx);
                let value = model
                    .eval(&selected, true)
                    .and_then(|v| v.as_bv())
                    .and_then(|bv| bv.as_u64())
                    .ok_or_else(|| SolverError::invariant("model evaluation failed for an array byte"))?;
                if value > 255 {
                    return Err(SolverError::invariant(
                        "integer from model is out of range for an array byte",
                    ));
                }
                bytes.push(value as u8);
            }
            assignment.bind(obj.clone(), bytes);
        }
        Ok(assignment)
    }
}

impl Default for Z3Adapter {
    fn default() -> Self {
        Z3Adapter::new()
    }
}

impl Z3Adapter {
    fn compute_truth_inner(&mut self, query: &Query) -> Result<bool> {
        // Leaves the stack at `constraints ++ [not expr]` — the next
        // query's `sync_stack` pops back from there, it isn't popped
        // here. That's the mirrored assertion stack `SolverPool` dispatch
        // reads (`spec.md` §8 invariant 5).
        self.sync_stack(&query.truth_assertion_target());
        match self.run_check()? {
            SatResult::Unsat => Ok(true),
            SatResult::Sat => Ok(false),
            SatResult::Unknown => unreachable!("run_check never returns Unknown"),
        }
    }

    fn compute_validity_inner(&mut self, query: &Query) -> Result<Validity> {
        if self.compute_truth_inner(query)? {
            return Ok(Validity::True);
        }

        self.sync_stack(query.full_constraints().as_slice());
        match self.run_check()? {
            SatResult::Unsat => Ok(Validity::False),
            SatResult::Sat => Ok(Validity::Unknown),
            SatResult::Unknown => unreachable!("run_check never returns Unknown"),
        }
    }

    fn compute_value_inner(&mut self, query: &Query) -> Result<Expr> {
        self.sync_stack(query.constraints.as_slice());
        let result = self.run_check()?;
        if result != SatResult::Sat {
            return Err(SolverError::invariant("computeValue called on an unsatisfiable query"));
        }
        let model =
            self.solver.get_model().ok_or_else(|| SolverError::invariant("z3 reported SAT but produced no model"))?;
        let target = self.translate(&query.expr);
        let evaluated = model.eval(&target, true).ok_or_else(|| SolverError::invariant("model evaluation failed"))?;
        if query.expr.width() == BOOL_WIDTH {
            let b = evaluated.as_bool().and_then(|b| b.as_bool()).unwrap_or(false);
            Ok(Expr::constant(b as u64, BOOL_WIDTH))
        } else {
            let v = evaluated.as_bv().and_then(|bv| bv.as_u64()).unwrap_or(0);
            Ok(Expr::constant(v, query.expr.width()))
        }
    }

    fn compute_initial_values_inner(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        self.sync_stack(query.full_constraints().as_slice());
        let result = self.run_check()?;
        if result == SatResult::Unsat {
            return Ok(None);
        }
        let assignment = self.extract_assignment(objects)?;
        if self.validate_models {
            for c in query.full_constraints().iter() {
                if !assignment.satisfies(c) {
                    return Err(SolverError::invariant(
                        "z3 model failed self-validation against its own query",
                    ));
                }
            }
        }
        Ok(Some(assignment))
    }
}

impl SolverImpl for Z3Adapter {
    fn compute_truth(&mut self, query: &Query) -> Result<bool> {
        let result = self.compute_truth_inner(query);
        self.clear_translation_cache();
        result
    }

    fn compute_validity(&mut self, query: &Query) -> Result<Validity> {
        let result = self.compute_validity_inner(query);
        self.clear_translation_cache();
        result
    }

    fn compute_value(&mut self, query: &Query) -> Result<Expr> {
        let result = self.compute_value_inner(query);
        self.clear_translation_cache();
        result
    }

    fn compute_initial_values(
        &mut self,
        query: &Query,
        objects: &[ArrayRef],
    ) -> Result<Option<Assignment>> {
        let result = self.compute_initial_values_inner(query, objects);
        self.clear_translation_cache();
        result
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn constraint_log(&mut self, query: &Query) -> Result<String> {
        self.sync_stack(query.constraints.as_slice());
        let rendered = self.solver.to_string();
        self.clear_translation_cache();
        Ok(rendered)
    }

    fn get_operation_status_code(&self) -> SolverRunStatus {
        self.last_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcp_reuse_keeps_shared_prefix() {
        let mut adapter = Z3Adapter::new();
        let c1 = Expr::constant(1, BOOL_WIDTH);
        let c2 = Expr::eq(Expr::constant(1, 8), Expr::constant(1, 8));
        adapter.sync_stack(&[c1.clone()]);
        assert_eq!(adapter.assertion_stack_len(), 1);
        adapter.sync_stack(&[c1.clone(), c2]);
        assert_eq!(adapter.assertion_stack_len(), 2);
        adapter.sync_stack(&[c1]);
        assert_eq!(adapter.assertion_stack_len(), 1);
    }
}
