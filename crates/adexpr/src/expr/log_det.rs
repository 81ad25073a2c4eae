//! Log-determinant and determinant nodes.
//!
//! Both factorize their operand once per forward pass with the chosen
//! [`LogDetMethod`] and reuse the factorization for the inverse in the
//! backward pass. A failed factorization (singular for LU, zero pivot for
//! LDLT, not positive-definite for LLT) marks the node invalid and its
//! backward pass only sends a zero seed into the operand.

use faer::Mat;
use log::debug;

use crate::backend::{Factorization, LogDetMethod, mat_from_view, vec_from_mat};
use crate::error::AdError;
use crate::expr::{Expr, ExprNode, beval_zero};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Seed for the operand: `scale * A^{-T}`.
fn inverse_transpose_seed(inv: &Mat<f64>, scale: f64) -> Vec<f64> {
    let seed = Mat::from_fn(inv.nrows(), inv.ncols(), |i, j| scale * inv[(j, i)]);
    vec_from_mat(seed.as_ref())
}

/// `log |det A|`.
pub struct LogDetNode<'a> {
    expr: Box<Expr<'a>>,
    method: LogDetMethod,
    factor: Option<Factorization>,
    view: ValueAdjView<'a>,
}

impl<'a> LogDetNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::NotSquareMatrix`] unless `expr` is square.
    pub fn new(expr: Expr<'a>, method: LogDetMethod) -> Result<Self, AdError> {
        expr.shape().require_square()?;
        Ok(Self {
            expr: Box::new(expr),
            method,
            factor: None,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }

    pub fn method(&self) -> LogDetMethod {
        self.method
    }
}

impl<'a> ExprNode<'a> for LogDetNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let a = mat_from_view(&self.expr.feval());
        let factor = Factorization::compute(a.as_ref(), self.method);
        if !factor.is_valid() {
            debug!("log_det: {:?} factorization failed", self.method);
        }
        self.view.set_val(0, factor.log_abs_det());
        self.factor = Some(factor);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let s = seed[0];
        let inv = self
            .factor
            .as_ref()
            .filter(|f| s != 0.0 && f.is_valid())
            .and_then(Factorization::inverse);
        match inv {
            Some(inv) => self.expr.beval(&inverse_transpose_seed(&inv, s)),
            None => beval_zero(&mut self.expr),
        }
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

/// `det A`.
pub struct DetNode<'a> {
    expr: Box<Expr<'a>>,
    method: LogDetMethod,
    factor: Option<Factorization>,
    view: ValueAdjView<'a>,
}

impl<'a> DetNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::NotSquareMatrix`] unless `expr` is square.
    pub fn new(expr: Expr<'a>, method: LogDetMethod) -> Result<Self, AdError> {
        expr.shape().require_square()?;
        Ok(Self {
            expr: Box::new(expr),
            method,
            factor: None,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }
}

impl<'a> ExprNode<'a> for DetNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let a = mat_from_view(&self.expr.feval());
        let factor = Factorization::compute(a.as_ref(), self.method);
        self.view.set_val(0, factor.det());
        self.factor = Some(factor);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let s = seed[0];
        let factor = self.factor.as_ref().filter(|f| s != 0.0 && f.is_valid());
        match factor.and_then(|f| Some((f.inverse()?, f.det()))) {
            // d det A / dA = det A * A^{-T}
            Some((inv, det)) => self.expr.beval(&inverse_transpose_seed(&inv, s * det)),
            None => beval_zero(&mut self.expr),
        }
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
