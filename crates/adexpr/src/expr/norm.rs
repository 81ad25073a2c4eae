use crate::expr::{Expr, ExprNode, SeedBuf};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Squared Euclidean (Frobenius) norm, `sum x_k^2`.
pub struct NormNode<'a> {
    expr: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> NormNode<'a> {
    pub fn new(expr: Expr<'a>) -> Self {
        Self {
            expr: Box::new(expr),
            view: ValueAdjView::unbound(Shape::Scalar),
        }
    }
}

impl<'a> ExprNode<'a> for NormNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.expr.feval();
        let total: f64 = (0..x.size()).map(|k| x.val(k) * x.val(k)).sum();
        self.view.set_val(0, total);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let x = self.expr.view();
        let s = seed[0];
        let child: SeedBuf = (0..x.size())
            .map(|k| if s == 0.0 { 0.0 } else { 2.0 * s * x.val(k) })
            .collect();
        self.expr.beval(&child);
    }

    fn bind_cache_size(&self) -> SizePack {
        self.expr.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.expr.bind_cache(cursor);
        let (view, cursor) = cursor.take(Shape::Scalar, self.single_bind_cache_size());
        self.view = view;
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.view
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.view = view.reshaped(Shape::Scalar);
    }
}
