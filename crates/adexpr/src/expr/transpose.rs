use crate::expr::{Expr, ExprNode, SeedBuf};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Matrix transpose. A vector becomes a `1 x n` row.
pub struct TransposeNode<'a> {
    expr: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> TransposeNode<'a> {
    pub fn new(expr: Expr<'a>) -> Self {
        let shape = expr.shape().transpose();
        Self {
            expr: Box::new(expr),
            view: ValueAdjView::unbound(shape),
        }
    }
}

impl<'a> ExprNode<'a> for TransposeNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.expr.feval();
        let (rows, cols) = (x.rows(), x.cols());
        for j in 0..cols {
            for i in 0..rows {
                // out is cols x rows
                self.view.set_val(j + i * cols, x.val(i + j * rows));
            }
        }
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        self.view.set_adj_from(seed);
        let shape = self.expr.shape();
        let (rows, cols) = (shape.rows(), shape.cols());
        let mut child: SeedBuf = SeedBuf::from_elem(0.0, rows * cols);
        for j in 0..cols {
            for i in 0..rows {
                child[i + j * rows] = seed[j + i * cols];
            }
        }
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
