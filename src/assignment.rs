//! Concrete byte values for a set of arrays, and expression evaluation
//! under them
//!
//! Grounded on `examples/original_source/lib/Solver/IndependentSolver.cpp`
//! (which builds exactly this kind of array->bytes map while stitching
//! `computeInitialValues` results back together) and
//! `include/klee/Expr/Assignment.h`'s `evaluate` tree-walk.

use std::collections::HashMap;

use crate::expr::{ArrayRef, Expr, ExprKind};

/// A concrete byte value for every array referenced by `bindings`.
/// Arrays not present are treated as all-zero, matching the original's
/// `Assignment::AllowFreeValues` default behavior for unconstrained bytes.
#[derive(Clone, Debug, Default)]
pub struct Assignment {
    bindings: HashMap<ArrayRef, Vec<u8>>,
}

impl Assignment {
    pub fn new() -> Self {
        Assignment { bindings: HashMap::new() }
    }

    pub fn bind(&mut self, array: ArrayRef, values: Vec<u8>) {
        self.bindings.insert(array, values);
    }

    pub fn get(&self, array: &ArrayRef) -> Option<&[u8]> {
        self.bindings.get(array).map(|v| v.as_slice())
    }

    pub fn arrays(&self) -> impl Iterator<Item = &ArrayRef> {
        self.bindings.keys()
    }

    fn byte_at(&self, array: &ArrayRef, offset: u32) -> u8 {
        if let Some(bytes) = self.get(array) {
            bytes.get(offset as usize).copied().unwrap_or(0)
        } else if let Some(b) = array.constant_byte(offset) {
            b
        } else {
            0
        }
    }

    /// Evaluates `expr` by substituting every `Read` with its concrete
    /// byte under this assignment. Panics are impossible: any
    /// unconstrained byte defaults to zero rather than failing, matching
    /// `Assignment::evaluate`'s `AllowFreeValues` mode.
    pub fn evaluate(&self, expr: &Expr) -> Expr {
        match expr.kind() {
            ExprKind::Constant(_) => expr.clone(),
            ExprKind::Read(updates, index) => {
                let index = self.evaluate(index);
                let offset = index.as_constant().unwrap_or(0) as u32;
                for (write_index, write_value) in updates.writes.iter() {
                    let write_index = self.evaluate(write_index);
                    if write_index.as_constant() == Some(offset as u64) {
                        return self.evaluate(write_value);
                    }
                }
                Expr::constant(self.byte_at(&updates.root, offset) as u64, 8)
            }
            ExprKind::Not(e) => Expr::not(self.evaluate(e)),
            ExprKind::And(a, b) => Expr::and(self.evaluate(a), self.evaluate(b)),
            ExprKind::Or(a, b) => Expr::or(self.evaluate(a), self.evaluate(b)),
            ExprKind::Xor(a, b) => Expr::xor(self.evaluate(a), self.evaluate(b)),
            ExprKind::Add(a, b) => Expr::add(self.evaluate(a), self.evaluate(b)),
            ExprKind::Sub(a, b) => Expr::sub(self.evaluate(a), self.evaluate(b)),
            ExprKind::Mul(a, b) => Expr::mul(self.evaluate(a), self.evaluate(b)),
            ExprKind::UDiv(a, b) => Expr::udiv(self.evaluate(a), self.evaluate(b)),
            ExprKind::SDiv(a, b) => Expr::sdiv(self.evaluate(a), self.evaluate(b)),
            ExprKind::URem(a, b) => Expr::urem(self.evaluate(a), self.evaluate(b)),
            ExprKind::SRem(a, b) => Expr::srem(self.evaluate(a), self.evaluate(b)),
            ExprKind::Shl(a, b) => Expr::shl(self.evaluate(a), self.evaluate(b)),
            ExprKind::LShr(a, b) => Expr::lshr(self.evaluate(a), self.evaluate(b)),
            ExprKind::AShr(a, b) => Expr::ashr(self.evaluate(a), self.evaluate(b)),
            ExprKind::Eq(a, b) => Expr::eq(self.evaluate(a), self.evaluate(b)),
            ExprKind::Ult(a, b) => Expr::ult(self.evaluate(a), self.evaluate(b)),
            ExprKind::Ule(a, b) => Expr::ule(self.evaluate(a), self.evaluate(b)),
            ExprKind::Slt(a, b) => Expr::slt(self.evaluate(a), self.evaluate(b)),
            ExprKind::Sle(a, b) => Expr::sle(self.evaluate(a), self.evaluate(b)),
            ExprKind::Select(c, t, f) => {
                let c = self.evaluate(c);
                if c.as_constant() == Some(1) {
                    self.evaluate(t)
                } else {
                    self.evaluate(f)
                }
            }
            ExprKind::ZExt(e, w) => Expr::zext(self.evaluate(e), *w),
            ExprKind::SExt(e, w) => Expr::sext(self.evaluate(e), *w),
            ExprKind::Extract(e, off, w) => Expr::extract(self.evaluate(e), *off, *w),
            ExprKind::Concat(hi, lo) => Expr::concat(self.evaluate(hi), self.evaluate(lo)),
        }
    }

    /// True iff `expr` (assumed boolean) evaluates to the constant 1.
    pub fn satisfies(&self, expr: &Expr) -> bool {
        self.evaluate(expr).as_constant() == Some(1)
    }
}
