use crate::error::AdError;
use crate::expr::{Expr, ExprNode, SeedAccum};
use crate::ops::BinaryFn;
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Elementwise binary functor with scalar broadcasting.
///
/// Backward runs the right operand before the left one.
pub struct BinaryNode<'a> {
    op: BinaryFn,
    lhs: Box<Expr<'a>>,
    rhs: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> BinaryNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] unless the operands have equal
    /// shapes or one of them is a scalar.
    pub fn new(op: BinaryFn, lhs: Expr<'a>, rhs: Expr<'a>) -> Result<Self, AdError> {
        let shape = lhs.shape().broadcast(rhs.shape())?;
        Ok(Self {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            view: ValueAdjView::unbound(shape),
        })
    }

    pub fn op(&self) -> BinaryFn {
        self.op
    }
}

impl<'a> ExprNode<'a> for BinaryNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.lhs.feval();
        let y = self.rhs.feval();
        for k in 0..self.view.size() {
            self.view.set_val(k, self.op.fmap(x.bval(k), y.bval(k)));
        }
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        if self.op.is_comparison() {
            return;
        }
        self.view.set_adj_from(seed);

        let x = self.lhs.view();
        let y = self.rhs.view();
        let mut lseed = SeedAccum::new(x.size());
        let mut rseed = SeedAccum::new(y.size());
        for (k, &s) in seed.iter().enumerate() {
            let (xk, yk, fk) = (x.bval(k), y.bval(k), self.view.val(k));
            lseed.add(k, self.op.blmap(s, xk, yk, fk));
            rseed.add(k, self.op.brmap(s, xk, yk, fk));
        }
        self.rhs.beval(rseed.as_slice());
        self.lhs.beval(lseed.as_slice());
    }

    fn bind_cache_size(&self) -> SizePack {
        self.lhs.bind_cache_size() + self.rhs.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        let n = self.view.size();
        if self.op.is_comparison() {
            SizePack::new(n, 0)
        } else {
            SizePack::new(n, n)
        }
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.lhs.bind_cache(cursor);
        let cursor = self.rhs.bind_cache(cursor);
        let (view, cursor) = cursor.take(self.shape(), self.single_bind_cache_size());
        self.view = view;
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.view
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.view = view.reshaped(self.shape());
    }
}
