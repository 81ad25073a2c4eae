//! Assignment into placeholders.
//!
//! [`EqNode`] makes a placeholder leaf take the value of an expression.
//! At bind time the expression's root gives its own slot back and is
//! rebound onto the placeholder's storage, so the root writes straight
//! into the placeholder and reads its adjoint from there.
//!
//! [`OpEqNode`] updates a variable in place (`x += e`, `x *= e`, ...).
//! The old value is kept in a snapshot slot so the backward pass can
//! restore it before differentiating the update.

use crate::error::AdError;
use crate::expr::{Expr, ExprNode, SeedAccum, SeedBuf};
use crate::ops::BinaryFn;
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};
use crate::var::VarView;

/// `placeholder = expr`.
pub struct EqNode<'a> {
    placeholder: VarView<'a>,
    expr: Box<Expr<'a>>,
}

impl<'a> EqNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if the expression does not have
    /// the placeholder's shape.
    pub fn new(placeholder: VarView<'a>, expr: Expr<'a>) -> Result<Self, AdError> {
        if placeholder.shape().dense() != expr.shape().dense() {
            return Err(AdError::ShapeMismatch {
                left: placeholder.shape(),
                right: expr.shape(),
            });
        }
        Ok(Self {
            placeholder,
            expr: Box::new(expr),
        })
    }
}

impl<'a> ExprNode<'a> for EqNode<'a> {
    fn shape(&self) -> Shape {
        self.placeholder.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let value = self.expr.feval();
        let target = self.placeholder.value_adj_view();
        if !target.shares_values_with(&value) {
            target.copy_values_of(&value);
        }
        target
    }

    fn beval(&mut self, seed: &[f64]) {
        self.placeholder.accumulate(seed);
        let adjoint: SeedBuf = self.placeholder.adjoints().into_iter().collect();
        self.expr.beval(&adjoint);
    }

    fn bind_cache_size(&self) -> SizePack {
        self.expr.bind_cache_size() - self.expr.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::zero()
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.expr.bind_cache(cursor);
        let cursor = cursor.rewind(self.expr.single_bind_cache_size());
        self.expr.rebind(self.placeholder.value_adj_view());
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.placeholder.value_adj_view()
    }

    fn rebind(&mut self, _view: ValueAdjView<'a>) {}
}

/// `var op= expr` for `op` one of `+ - * /`.
pub struct OpEqNode<'a> {
    op: BinaryFn,
    var: VarView<'a>,
    expr: Box<Expr<'a>>,
    snapshot: ValueAdjView<'a>,
}

impl<'a> OpEqNode<'a> {
    /// # Errors
    ///
    /// - [`AdError::InvalidOperation`] if `op` is a comparison.
    /// - [`AdError::ShapeMismatch`] unless `expr` is a scalar or has the
    ///   variable's shape.
    pub fn new(op: BinaryFn, var: VarView<'a>, expr: Expr<'a>) -> Result<Self, AdError> {
        if op.is_comparison() {
            return Err(AdError::InvalidOperation(format!(
                "{} cannot be used as a compound assignment",
                op.name()
            )));
        }
        var.shape().accepts_param(expr.shape())?;
        Ok(Self {
            op,
            var,
            expr: Box::new(expr),
            snapshot: ValueAdjView::unbound(var.shape()),
        })
    }

    pub fn op(&self) -> BinaryFn {
        self.op
    }
}

impl<'a> ExprNode<'a> for OpEqNode<'a> {
    fn shape(&self) -> Shape {
        self.var.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let y = self.expr.feval();
        let x = self.var.value_adj_view();
        self.snapshot.copy_values_of(&x);
        for k in 0..x.size() {
            let (xk, yk) = (x.val(k), y.bval(k));
            x.set_val(k, self.op.fmap(xk, yk));
        }
        x
    }

    fn beval(&mut self, seed: &[f64]) {
        let x = self.var.value_adj_view();
        self.var.accumulate(seed);

        // Undo the update, and move the adjoint of the updated value aside.
        x.copy_values_of(&self.snapshot);
        for k in 0..x.size() {
            self.snapshot.set_adj(k, x.adj(k));
        }
        x.reset_adj();

        let y = self.expr.view();
        let mut lseed: SeedBuf = SeedBuf::from_elem(0.0, x.size());
        let mut rseed = SeedAccum::new(y.size());
        for k in 0..x.size() {
            let s = self.snapshot.adj(k);
            let (xk, yk) = (x.val(k), y.bval(k));
            let fk = self.op.fmap(xk, yk);
            lseed[k] = self.op.blmap(s, xk, yk, fk);
            rseed.add(k, self.op.brmap(s, xk, yk, fk));
        }
        self.expr.beval(rseed.as_slice());
        self.var.accumulate(&lseed);
    }

    fn bind_cache_size(&self) -> SizePack {
        let n = self.var.size();
        self.expr.bind_cache_size() + SizePack::new(n, n)
    }

    // The snapshot is private storage, not a value slot that could alias a
    // placeholder.
    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::zero()
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.expr.bind_cache(cursor);
        let n = self.var.size();
        let (snapshot, cursor) = cursor.take(self.var.shape(), SizePack::new(n, n));
        self.snapshot = snapshot;
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.var.value_adj_view()
    }

    fn rebind(&mut self, _view: ValueAdjView<'a>) {}
}
