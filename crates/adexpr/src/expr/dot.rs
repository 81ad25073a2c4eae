use crate::backend::{mat_from_seed, mat_from_view, vec_from_mat, write_values};
use crate::error::AdError;
use crate::expr::{Expr, ExprNode, beval_zero};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Matrix-vector or matrix-matrix product.
pub struct DotNode<'a> {
    lhs: Box<Expr<'a>>,
    rhs: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> DotNode<'a> {
    /// # Errors
    ///
    /// - [`AdError::ShapeMismatch`] unless `lhs` is a matrix and `rhs` a
    ///   vector or matrix.
    /// - [`AdError::InnerDimensionMismatch`] if `lhs.cols != rhs.rows`.
    pub fn new(lhs: Expr<'a>, rhs: Expr<'a>) -> Result<Self, AdError> {
        let (ls, rs) = (lhs.shape(), rhs.shape());
        if !ls.is_matrix() || !(rs.is_vector() || rs.is_matrix()) {
            return Err(AdError::ShapeMismatch {
                left: ls,
                right: rs,
            });
        }
        if ls.cols() != rs.rows() {
            return Err(AdError::InnerDimensionMismatch {
                left_cols: ls.cols(),
                right_rows: rs.rows(),
            });
        }
        let shape = if rs.is_vector() {
            Shape::Vector(ls.rows())
        } else {
            Shape::Matrix(ls.rows(), rs.cols())
        };
        Ok(Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            view: ValueAdjView::unbound(shape),
        })
    }
}

impl<'a> ExprNode<'a> for DotNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let a = mat_from_view(&self.lhs.feval());
        let b = mat_from_view(&self.rhs.feval());
        let c = &a * &b;
        write_values(&self.view, c.as_ref());
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        self.view.set_adj_from(seed);
        if seed.iter().all(|&s| s == 0.0) {
            beval_zero(&mut self.rhs);
            beval_zero(&mut self.lhs);
            return;
        }
        let s = mat_from_seed(seed, self.view.rows(), self.view.cols());
        let a = mat_from_view(&self.lhs.view());
        let b = mat_from_view(&self.rhs.view());

        // d(AB) -> (S B^T, A^T S)
        let radj = a.transpose() * s;
        let ladj = s * b.transpose();
        self.rhs.beval(&vec_from_mat(radj.as_ref()));
        self.lhs.beval(&vec_from_mat(ladj.as_ref()));
    }

    fn bind_cache_size(&self) -> SizePack {
        self.lhs.bind_cache_size() + self.rhs.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        let n = self.view.size();
        SizePack::new(n, n)
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
