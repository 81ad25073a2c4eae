//! Expression nodes.
//!
//! An expression is a tree of nodes owned by value: every composite node
//! stores its children inside itself. All nodes implement [`ExprNode`],
//! and [`Expr`] is the closed set of node kinds that dispatches to them.
//!
//! # Architecture
//!
//! ```text
//!   build (operators, free functions)      unbound Expr<'a>
//!            │
//!            ▼
//!   bind_cache_size()  ──►  Workspace::new(size)
//!            │
//!            ▼
//!   bind_cache(cursor)     children first, own slot last
//!            │
//!            ▼
//!   feval()  leaves → root       values cached in the arena
//!   beval(seed)  root → leaves   adjoints accumulated into leaves
//! ```
//!
//! # Protocol
//!
//! - `feval` evaluates children before reading their values and returns
//!   a view of the node's own value.
//! - `beval(seed)` may only run after `feval` in the same pass; `seed`
//!   has one entry per element of the node's value.
//! - `bind_cache_size` is the node's own `single_bind_cache_size` plus its
//!   children's requirements. The root's own slot is always the last
//!   region its subtree claims, which lets an [`EqNode`] hand it back and
//!   alias the root onto a placeholder instead.

mod binary;
mod build;
mod constant;
mod dot;
mod eq;
mod glue;
mod if_else;
mod log_det;
mod norm;
mod pow;
mod prod;
mod sum;
mod transpose;
mod unary;

use std::fmt;

use smallvec::{SmallVec, smallvec};

use crate::shape::Shape;
use crate::stat::{BernoulliNode, CauchyNode, NormalNode, UniformNode, WishartNode};
use crate::value::{Cursor, SizePack, ValueAdjView};
use crate::var::VarView;

pub use binary::BinaryNode;
pub use build::{
    IntoExpr, acos, asin, atan, constant, constant_matrix, constant_vector, cos, cosh, det,
    dot, erf, exp, for_each, glue, if_else, log, log_det, norm, pow, prod, prod_iter,
    sigmoid, sin, sinh, sqrt, sum, sum_iter, tan, tanh, transpose,
};
pub use constant::Constant;
pub use dot::DotNode;
pub use eq::{EqNode, OpEqNode};
pub use glue::{ForEachNode, GlueNode};
pub use if_else::IfElseNode;
pub use log_det::{DetNode, LogDetNode};
pub use norm::NormNode;
pub use pow::{PowNode, pow_scalar};
pub use prod::{ProdElemNode, ProdIterNode};
pub use sum::{SumElemNode, SumIterNode};
pub use transpose::TransposeNode;
pub use unary::UnaryNode;

/// Seed buffer; scalar seeds stay on the stack.
pub type SeedBuf = SmallVec<[f64; 4]>;

/// Capabilities shared by every expression node.
pub trait ExprNode<'a> {
    /// Shape of the node's value.
    fn shape(&self) -> Shape;

    /// Forward-evaluate the subtree and return the node's value.
    fn feval(&mut self) -> ValueAdjView<'a>;

    /// Propagate `seed` (the adjoint of this node's output) into the
    /// children. Adjoints are accumulated, never overwritten.
    fn beval(&mut self, seed: &[f64]);

    /// Buffer requirement of the whole subtree.
    fn bind_cache_size(&self) -> SizePack;

    /// Buffer requirement of this node's own value slot.
    fn single_bind_cache_size(&self) -> SizePack;

    /// Claim slots for the subtree, children first, and return the
    /// advanced cursor.
    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a>;

    /// View of the node's value as of the last `feval`.
    fn view(&self) -> ValueAdjView<'a>;

    /// Move the node's own value slot onto `view`. Nodes without an own
    /// slot ignore this.
    fn rebind(&mut self, view: ValueAdjView<'a>);
}

/// An expression tree.
pub enum Expr<'a> {
    Constant(Constant<'a>),
    Var(VarView<'a>),
    Unary(UnaryNode<'a>),
    Binary(BinaryNode<'a>),
    Dot(DotNode<'a>),
    Pow(PowNode<'a>),
    SumIter(SumIterNode<'a>),
    SumElem(SumElemNode<'a>),
    ProdIter(ProdIterNode<'a>),
    ProdElem(ProdElemNode<'a>),
    Norm(NormNode<'a>),
    Transpose(TransposeNode<'a>),
    Glue(GlueNode<'a>),
    ForEach(ForEachNode<'a>),
    Eq(EqNode<'a>),
    OpEq(OpEqNode<'a>),
    IfElse(IfElseNode<'a>),
    LogDet(LogDetNode<'a>),
    Det(DetNode<'a>),
    Normal(NormalNode<'a>),
    Cauchy(CauchyNode<'a>),
    Bernoulli(BernoulliNode<'a>),
    Wishart(WishartNode<'a>),
    Uniform(UniformNode<'a>),
}

macro_rules! dispatch {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            Expr::Constant($node) => $body,
            Expr::Var($node) => $body,
            Expr::Unary($node) => $body,
            Expr::Binary($node) => $body,
            Expr::Dot($node) => $body,
            Expr::Pow($node) => $body,
            Expr::SumIter($node) => $body,
            Expr::SumElem($node) => $body,
            Expr::ProdIter($node) => $body,
            Expr::ProdElem($node) => $body,
            Expr::Norm($node) => $body,
            Expr::Transpose($node) => $body,
            Expr::Glue($node) => $body,
            Expr::ForEach($node) => $body,
            Expr::Eq($node) => $body,
            Expr::OpEq($node) => $body,
            Expr::IfElse($node) => $body,
            Expr::LogDet($node) => $body,
            Expr::Det($node) => $body,
            Expr::Normal($node) => $body,
            Expr::Cauchy($node) => $body,
            Expr::Bernoulli($node) => $body,
            Expr::Wishart($node) => $body,
            Expr::Uniform($node) => $body,
        }
    };
}

impl<'a> ExprNode<'a> for Expr<'a> {
    fn shape(&self) -> Shape {
        dispatch!(self, n => n.shape())
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        dispatch!(self, n => n.feval())
    }

    fn beval(&mut self, seed: &[f64]) {
        debug_assert_eq!(seed.len(), self.shape().size(), "seed length must match node size");
        dispatch!(self, n => n.beval(seed))
    }

    fn bind_cache_size(&self) -> SizePack {
        dispatch!(self, n => n.bind_cache_size())
    }

    fn single_bind_cache_size(&self) -> SizePack {
        dispatch!(self, n => n.single_bind_cache_size())
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        dispatch!(self, n => n.bind_cache(cursor))
    }

    fn view(&self) -> ValueAdjView<'a> {
        dispatch!(self, n => n.view())
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        dispatch!(self, n => n.rebind(view))
    }
}

impl<'a> Expr<'a> {
    /// Node kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "constant",
            Expr::Var(_) => "var",
            Expr::Unary(n) => n.op().name(),
            Expr::Binary(n) => n.op().name(),
            Expr::Dot(_) => "dot",
            Expr::Pow(_) => "pow",
            Expr::SumIter(_) => "sum_iter",
            Expr::SumElem(_) => "sum",
            Expr::ProdIter(_) => "prod_iter",
            Expr::ProdElem(_) => "prod",
            Expr::Norm(_) => "norm",
            Expr::Transpose(_) => "transpose",
            Expr::Glue(_) => "glue",
            Expr::ForEach(_) => "for_each",
            Expr::Eq(_) => "eq",
            Expr::OpEq(n) => n.op().name(),
            Expr::IfElse(_) => "if_else",
            Expr::LogDet(_) => "log_det",
            Expr::Det(_) => "det",
            Expr::Normal(_) => "normal",
            Expr::Cauchy(_) => "cauchy",
            Expr::Bernoulli(_) => "bernoulli",
            Expr::Wishart(_) => "wishart",
            Expr::Uniform(_) => "uniform",
        }
    }

    /// The folded constant, if this expression is one.
    pub fn as_constant(&self) -> Option<&Constant<'a>> {
        match self {
            Expr::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }
}

impl fmt::Debug for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr::{}({})", self.kind(), self.shape())
    }
}

impl<'a> ExprNode<'a> for VarView<'a> {
    fn shape(&self) -> Shape {
        VarView::shape(self)
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        self.symmetrize()
    }

    fn beval(&mut self, seed: &[f64]) {
        self.accumulate(seed);
    }

    fn bind_cache_size(&self) -> SizePack {
        SizePack::zero()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::zero()
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.value_adj_view()
    }

    fn rebind(&mut self, _view: ValueAdjView<'a>) {}
}

/// Accumulates per-element seeds for an operand that may be broadcast.
///
/// A scalar operand of an `n`-element node collects the sum of all `n`
/// contributions; an array operand collects them elementwise.
pub(crate) struct SeedAccum {
    buf: SeedBuf,
    broadcast: bool,
}

impl SeedAccum {
    pub(crate) fn new(operand_size: usize) -> Self {
        Self {
            buf: smallvec![0.0; operand_size],
            broadcast: operand_size == 1,
        }
    }

    #[inline]
    pub(crate) fn add(&mut self, k: usize, v: f64) {
        let i = if self.broadcast { 0 } else { k };
        self.buf[i] += v;
    }

    pub(crate) fn as_slice(&self) -> &[f64] {
        &self.buf
    }
}

/// Zero seed of the given length.
pub(crate) fn zero_seed(size: usize) -> SeedBuf {
    smallvec![0.0; size]
}

/// Send a zero seed through `expr`, so placeholders below it still pass
/// their own adjoints on.
pub(crate) fn beval_zero(expr: &mut Expr<'_>) {
    let seed = zero_seed(expr.shape().size());
    expr.beval(&seed);
}

/// Seed of the given length with every entry equal to `value`.
pub(crate) fn uniform_seed(size: usize, value: f64) -> SeedBuf {
    smallvec![value; size]
}
