use crate::expr::{Expr, ExprNode, SeedBuf};
use crate::ops::UnaryFn;
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Elementwise application of a unary functor.
pub struct UnaryNode<'a> {
    op: UnaryFn,
    expr: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> UnaryNode<'a> {
    pub fn new(op: UnaryFn, expr: Expr<'a>) -> Self {
        let shape = expr.shape().dense();
        Self {
            op,
            expr: Box::new(expr),
            view: ValueAdjView::unbound(shape),
        }
    }

    pub fn op(&self) -> UnaryFn {
        self.op
    }
}

impl<'a> ExprNode<'a> for UnaryNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.expr.feval();
        for k in 0..self.view.size() {
            self.view.set_val(k, self.op.fmap(x.val(k)));
        }
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        self.view.set_adj_from(seed);
        let x = self.expr.view();
        let child: SeedBuf = seed
            .iter()
            .enumerate()
            .map(|(k, &s)| self.op.bmap(s, x.val(k), self.view.val(k)))
            .collect();
        self.expr.beval(&child);
    }

    fn bind_cache_size(&self) -> SizePack {
        self.expr.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        let n = self.view.size();
        SizePack::new(n, n)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.expr.bind_cache(cursor);
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
