use faer::Mat;
use log::debug;

use crate::backend::{Factorization, mat_from_view, vec_from_mat};
use crate::error::AdError;
use crate::expr::{Expr, ExprNode, beval_zero};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

struct WishartCache {
    x_factor: Factorization,
    v_inv: Mat<f64>,
    x: Mat<f64>,
}

/// Wishart log-density,
/// `(n-p-1) log det L_X - 0.5 tr(V^{-1} X) - n log det L_V`,
/// where `L` are Cholesky factors and `p` the matrix dimension.
pub struct WishartNode<'a> {
    x: Box<Expr<'a>>,
    v: Box<Expr<'a>>,
    n: f64,
    cache: Option<WishartCache>,
    view: ValueAdjView<'a>,
}

impl<'a> WishartNode<'a> {
    /// # Errors
    ///
    /// - [`AdError::NotSquareMatrix`] if `x` or `v` is not square.
    /// - [`AdError::ShapeMismatch`] if they differ in size.
    pub fn new(x: Expr<'a>, v: Expr<'a>, n: f64) -> Result<Self, AdError> {
        x.shape().require_square()?;
        v.shape().require_square()?;
        if x.shape().rows() != v.shape().rows() {
            return Err(AdError::ShapeMismatch {
                left: x.shape(),
                right: v.shape(),
            });
        }
        Ok(Self {
            x: Box::new(x),
            v: Box::new(v),
            n,
            cache: None,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }

    fn dim(&self) -> usize {
        self.x.shape().rows()
    }
}

impl<'a> ExprNode<'a> for WishartNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = mat_from_view(&self.x.feval());
        let v = mat_from_view(&self.v.feval());
        let p = self.dim() as f64;
        let n = self.n;

        let x_factor = Factorization::cholesky(x.as_ref());
        let v_factor = Factorization::cholesky(v.as_ref());
        let v_inv = v_factor.inverse().filter(|_| v_factor.is_valid());

        let value = match v_inv {
            Some(v_inv) if x_factor.is_valid() && n > p - 1.0 => {
                let dim = self.dim();
                let trace: f64 = (0..dim)
                    .flat_map(|i| (0..dim).map(move |j| (i, j)))
                    .map(|(i, j)| v_inv[(i, j)] * x[(j, i)])
                    .sum();
                let value = (n - p - 1.0) * x_factor.half_log_det() - 0.5 * trace
                    - n * v_factor.half_log_det();
                self.cache = Some(WishartCache { x_factor, v_inv, x });
                value
            }
            _ => {
                debug!("wishart: matrices not positive-definite or n <= p - 1");
                self.cache = None;
                f64::NEG_INFINITY
            }
        };
        self.view.set_val(0, value);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let s = seed[0];
        let dim = self.dim();
        let n = self.n;
        let Some(cache) = self.cache.as_ref() else {
            beval_zero(&mut self.v);
            beval_zero(&mut self.x);
            return;
        };
        let Some(x_inv) = cache.x_factor.inverse() else {
            beval_zero(&mut self.v);
            beval_zero(&mut self.x);
            return;
        };
        let v_inv = &cache.v_inv;
        let c = n - dim as f64 - 1.0;

        let dx = Mat::from_fn(dim, dim, |i, j| 0.5 * s * (c * x_inv[(i, j)] - v_inv[(i, j)]));
        let vxv = v_inv * &cache.x * v_inv;
        let dv = Mat::from_fn(dim, dim, |i, j| 0.5 * s * (vxv[(i, j)] - n * v_inv[(i, j)]));

        self.v.beval(&vec_from_mat(dv.as_ref()));
        self.x.beval(&vec_from_mat(dx.as_ref()));
    }

    fn bind_cache_size(&self) -> SizePack {
        self.x.bind_cache_size() + self.v.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.x.bind_cache(cursor);
        let cursor = self.v.bind_cache(cursor);
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
