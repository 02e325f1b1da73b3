//! The expression DAG and array handles the solver stack operates on
//!
//! The query-generating engine and the low-level SMT builder are external
//! collaborators (`spec.md` §1); this module is the scaffolding that
//! stands in for them inside this crate — a concrete bit-vector/array
//! expression language with exactly the shape §3 describes: an immutable,
//! `Rc`-shared DAG with a stable structural hash, a bit width, and a kind
//! that's recognizable as a constant without inspecting anything else.
//!
//! Grounded on `verification::solver::Formula` (the teacher's own
//! recursive expression enum), generalized to bit-vectors and reads the
//! way `examples/original_source/lib/Solver/IndependentSolver.cpp`'s
//! `findReads`/`ReadExpr`/`UpdateList` need.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

pub type Width = u32;

/// The width of a one-bit boolean expression (KLEE's `Expr::Bool`).
pub const BOOL_WIDTH: Width = 1;

/// A symbolic byte array of known size, optionally backed by known
/// literal contents. Identity is by pointer: two `ArrayRef`s with equal
/// names and contents are still distinct arrays.
#[derive(Clone, Debug)]
pub struct ArrayRef(Rc<ArrayData>);

#[derive(Debug)]
struct ArrayData {
    name: String,
    size: u32,
    /// `Some` iff this array is a constant array with known contents.
    constant_values: Option<Vec<u8>>,
}

impl ArrayRef {
    pub fn new_symbolic(name: impl Into<String>, size: u32) -> Self {
        ArrayRef(Rc::new(ArrayData { name: name.into(), size, constant_values: None }))
    }

    pub fn new_constant(name: impl Into<String>, values: Vec<u8>) -> Self {
        let size = values.len() as u32;
        ArrayRef(Rc::new(ArrayData { name: name.into(), size, constant_values: Some(values) }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn size(&self) -> u32 {
        self.0.size
    }

    pub fn is_constant_array(&self) -> bool {
        self.0.constant_values.is_some()
    }

    /// Value at `offset` for a constant array, defined for every in-range
    /// offset (§3 invariant).
    pub fn constant_byte(&self, offset: u32) -> Option<u8> {
        self.0.constant_values.as_ref().and_then(|v| v.get(offset as usize).copied())
    }

    fn ptr_key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for ArrayRef {}

impl Hash for ArrayRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr_key().hash(state);
    }
}

impl PartialOrd for ArrayRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ArrayRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ptr_key().cmp(&other.ptr_key())
    }
}

/// A chain of writes layered on top of a root array, newest write first.
/// `Read(updates, index)` means: walk `writes` for the first entry whose
/// index matches `index`, falling back to `root` if none match.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateList {
    pub root: ArrayRef,
    pub writes: Rc<Vec<(Expr, Expr)>>,
}

impl UpdateList {
    pub fn root(root: ArrayRef) -> Self {
        UpdateList { root, writes: Rc::new(Vec::new()) }
    }

    /// `head`, in the original's terms: is there at least one write
    /// layered on top of the root array?
    pub fn has_updates(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Returns a new update list with one more write pushed on top.
    pub fn extend(&self, index: Expr, value: Expr) -> Self {
        let mut writes = (*self.writes).clone();
        writes.insert(0, (index, value));
        UpdateList { root: self.root.clone(), writes: Rc::new(writes) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExprKind {
    Constant(u64),
    Read(UpdateList, Expr),
    Not(Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Xor(Expr, Expr),
    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    UDiv(Expr, Expr),
    SDiv(Expr, Expr),
    URem(Expr, Expr),
    SRem(Expr, Expr),
    Shl(Expr, Expr),
    LShr(Expr, Expr),
    AShr(Expr, Expr),
    Eq(Expr, Expr),
    Ult(Expr, Expr),
    Ule(Expr, Expr),
    Slt(Expr, Expr),
    Sle(Expr, Expr),
    Select(Expr, Expr, Expr),
    ZExt(Expr, Width),
    SExt(Expr, Width),
    Extract(Expr, u32, Width),
    Concat(Expr, Expr),
}

struct ExprNode {
    kind: ExprKind,
    width: Width,
    hash: u64,
}

impl std::fmt::Debug for ExprNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.width)
    }
}

/// An immutable, reference-counted DAG node. Equality and hashing are
/// structural (`spec.md` §3): the same shape, anywhere in the DAG,
/// compares equal regardless of where it was built.
#[derive(Clone)]
pub struct Expr(Rc<ExprNode>);

macro_rules! binop {
    ($name:ident, $variant:ident, $fold:expr) => {
        pub fn $name(a: Expr, b: Expr) -> Self {
            debug_assert_eq!(a.width(), b.width());
            let width = a.width();
            if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
                let f: fn(u64, u64, Width) -> u64 = $fold;
                return Expr::constant(f(x, y, width), width);
            }
            Expr::new(ExprKind::$variant(a, b), width)
        }
    };
}

macro_rules! cmp {
    ($name:ident, $variant:ident, $fold:expr) => {
        pub fn $name(a: Expr, b: Expr) -> Self {
            debug_assert_eq!(a.width(), b.width());
            if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
                let f: fn(u64, u64) -> bool = $fold;
                return Expr::constant(f(x, y) as u64, BOOL_WIDTH);
            }
            Expr::new(ExprKind::$variant(a, b), BOOL_WIDTH)
        }
    };
}

impl Expr {
    fn new(kind: ExprKind, width: Width) -> Self {
        let hash = hash_of(&kind, width);
        Expr(Rc::new(ExprNode { kind, width, hash }))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn width(&self) -> Width {
        self.0.width
    }

    pub fn structural_hash(&self) -> u64 {
        self.0.hash
    }

    pub fn constant(value: u64, width: Width) -> Self {
        let mask = mask_for(width);
        Expr::new(ExprKind::Constant(value & mask), width)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.0.kind, ExprKind::Constant(_))
    }

    pub fn as_constant(&self) -> Option<u64> {
        match self.0.kind {
            ExprKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.width() == BOOL_WIDTH && self.as_constant() == Some(1)
    }

    pub fn is_false(&self) -> bool {
        self.width() == BOOL_WIDTH && self.as_constant() == Some(0)
    }

    pub fn read(updates: UpdateList, index: Expr) -> Self {
        if let (Some(idx), true) = (index.as_constant(), !updates.has_updates()) {
            if let Some(byte) = updates.root.constant_byte(idx as u32) {
                return Expr::constant(byte as u64, 8);
            }
        }
        Expr::new(ExprKind::Read(updates, index), 8)
    }

    pub fn not(e: Expr) -> Self {
        if let Some(v) = e.as_constant() {
            return Expr::constant(!v, e.width());
        }
        if let ExprKind::Not(inner) = e.kind() {
            return inner.clone();
        }
        let width = e.width();
        Expr::new(ExprKind::Not(e), width)
    }

    binop!(add, Add, |x, y, w| x.wrapping_add(y) & mask_for(w));
    binop!(sub, Sub, |x, y, w| x.wrapping_sub(y) & mask_for(w));
    binop!(mul, Mul, |x, y, w| x.wrapping_mul(y) & mask_for(w));
    binop!(and, And, |x, y, _w| x & y);
    binop!(or, Or, |x, y, _w| x | y);
    binop!(xor, Xor, |x, y, _w| x ^ y);
    binop!(shl, Shl, |x, y, w| if y >= w as u64 { 0 } else { (x << y) & mask_for(w) });
    binop!(lshr, LShr, |x, y, w| if y >= w as u64 { 0 } else { (x & mask_for(w)) >> y });

    pub fn udiv(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        let width = a.width();
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            if y != 0 {
                return Expr::constant(x / y, width);
            }
        }
        Expr::new(ExprKind::UDiv(a, b), width)
    }

    pub fn urem(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        let width = a.width();
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            if y != 0 {
                return Expr::constant(x % y, width);
            }
        }
        Expr::new(ExprKind::URem(a, b), width)
    }

    pub fn sdiv(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        let width = a.width();
        Expr::new(ExprKind::SDiv(a, b), width)
    }

    pub fn srem(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        let width = a.width();
        Expr::new(ExprKind::SRem(a, b), width)
    }

    pub fn ashr(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        let width = a.width();
        Expr::new(ExprKind::AShr(a, b), width)
    }

    cmp!(eq, Eq, |x, y| x == y);
    cmp!(ult, Ult, |x, y| x < y);
    cmp!(ule, Ule, |x, y| x <= y);

    pub fn slt(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        Expr::new(ExprKind::Slt(a, b), BOOL_WIDTH)
    }

    pub fn sle(a: Expr, b: Expr) -> Self {
        debug_assert_eq!(a.width(), b.width());
        Expr::new(ExprKind::Sle(a, b), BOOL_WIDTH)
    }

    pub fn select(cond: Expr, t: Expr, f: Expr) -> Self {
        debug_assert_eq!(cond.width(), BOOL_WIDTH);
        debug_assert_eq!(t.width(), f.width());
        if let Some(c) = cond.as_constant() {
            return if c != 0 { t } else { f };
        }
        let width = t.width();
        Expr::new(ExprKind::Select(cond, t, f), width)
    }

    pub fn zext(e: Expr, width: Width) -> Self {
        debug_assert!(width >= e.width());
        if width == e.width() {
            return e;
        }
        if let Some(v) = e.as_constant() {
            return Expr::constant(v, width);
        }
        Expr::new(ExprKind::ZExt(e, width), width)
    }

    pub fn sext(e: Expr, width: Width) -> Self {
        debug_assert!(width >= e.width());
        if width == e.width() {
            return e;
        }
        Expr::new(ExprKind::SExt(e, width), width)
    }

    pub fn extract(e: Expr, offset: u32, width: Width) -> Self {
        debug_assert!(offset + width <= e.width());
        if offset == 0 && width == e.width() {
            return e;
        }
        if let Some(v) = e.as_constant() {
            return Expr::constant((v >> offset) & mask_for(width), width);
        }
        Expr::new(ExprKind::Extract(e, offset, width), width)
    }

    pub fn concat(hi: Expr, lo: Expr) -> Self {
        let width = hi.width() + lo.width();
        if let (Some(h), Some(l)) = (hi.as_constant(), lo.as_constant()) {
            return Expr::constant((h << lo.width()) | l, width);
        }
        Expr::new(ExprKind::Concat(hi, lo), width)
    }

    /// KLEE's `Expr::createIsZero`: the width-aware logical negation used
    /// to build `Query::negateExpr` and `mustBeFalse`.
    pub fn is_zero(e: Expr) -> Self {
        if e.width() == BOOL_WIDTH {
            Expr::not(e)
        } else {
            let width = e.width();
            Expr::eq(e, Expr::constant(0, width))
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash
                && self.0.width == other.0.width
                && self.0.kind == other.0.kind)
    }
}
impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .hash
            .cmp(&other.0.hash)
            .then_with(|| self.0.width.cmp(&other.0.width))
            .then_with(|| self.0.kind.cmp(&other.0.kind))
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0.kind)
    }
}

fn mask_for(width: Width) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn hash_of(kind: &ExprKind, width: Width) -> u64 {
    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    width.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_sharing() {
        let a = ArrayRef::new_symbolic("buf", 4);
        let x1 = Expr::read(UpdateList::root(a.clone()), Expr::constant(0, 32));
        let x2 = Expr::read(UpdateList::root(a), Expr::constant(0, 32));
        assert_eq!(x1, x2);
        assert_eq!(x1.structural_hash(), x2.structural_hash());
    }

    #[test]
    fn distinct_arrays_with_same_name_are_distinct() {
        let a1 = ArrayRef::new_symbolic("buf", 4);
        let a2 = ArrayRef::new_symbolic("buf", 4);
        assert_ne!(a1, a2);
        let r1 = Expr::read(UpdateList::root(a1), Expr::constant(0, 32));
        let r2 = Expr::read(UpdateList::root(a2), Expr::constant(0, 32));
        assert_ne!(r1, r2);
    }

    #[test]
    fn constant_folding() {
        let sum = Expr::add(Expr::constant(2, 8), Expr::constant(3, 8));
        assert_eq!(sum.as_constant(), Some(5));
    }

    #[test]
    fn is_zero_matches_width() {
        let bool_e = Expr::eq(Expr::constant(1, 8), Expr::constant(1, 8));
        assert!(matches!(Expr::is_zero(bool_e).kind(), ExprKind::Not(_)));

        let wide = Expr::new(ExprKind::Read(UpdateList::root(ArrayRef::new_symbolic("a", 4)), Expr::constant(0, 32)), 8);
        assert!(matches!(Expr::is_zero(wide).kind(), ExprKind::Eq(_, _)));
    }

    #[test]
    fn constant_array_read_resolves_directly() {
        let arr = ArrayRef::new_constant("k", vec![10, 20, 30]);
        let read = Expr::read(UpdateList::root(arr), Expr::constant(1, 32));
        assert_eq!(read.as_constant(), Some(20));
    }
}
