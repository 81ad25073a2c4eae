use faer::Mat;
use log::debug;

use crate::backend::{Factorization, mat_from_view, vec_from_mat};
use crate::error::AdError;
use crate::expr::{Expr, ExprNode, SeedAccum, SeedBuf, beval_zero};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

struct CovarianceCache {
    factor: Factorization,
    // Sigma^{-1} (x - mean)
    z: Vec<f64>,
}

/// Normal log-density, `sum -0.5 z^2 - log sigma` elementwise, or
/// `-0.5 (x-m)^T Sigma^{-1} (x-m) - log det L` for a covariance matrix.
pub struct NormalNode<'a> {
    x: Box<Expr<'a>>,
    mean: Box<Expr<'a>>,
    sigma: Box<Expr<'a>>,
    covariance: bool,
    valid: bool,
    cache: Option<CovarianceCache>,
    view: ValueAdjView<'a>,
}

impl<'a> NormalNode<'a> {
    /// # Errors
    ///
    /// - [`AdError::NotSquareMatrix`] for a non-square covariance.
    /// - [`AdError::ShapeMismatch`] if `x` is not a vector matching the
    ///   covariance, or a parameter does not broadcast against `x`.
    pub fn new(x: Expr<'a>, mean: Expr<'a>, sigma: Expr<'a>) -> Result<Self, AdError> {
        let covariance = sigma.shape().is_matrix();
        if covariance {
            sigma.shape().require_square()?;
            let n = sigma.shape().rows();
            if x.shape() != Shape::Vector(n) {
                return Err(AdError::ShapeMismatch {
                    left: x.shape(),
                    right: sigma.shape(),
                });
            }
        } else {
            x.shape().accepts_param(sigma.shape())?;
        }
        x.shape().accepts_param(mean.shape())?;
        Ok(Self {
            x: Box::new(x),
            mean: Box::new(mean),
            sigma: Box::new(sigma),
            covariance,
            valid: false,
            cache: None,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }

    fn feval_elementwise(&mut self, x: ValueAdjView<'a>, m: ValueAdjView<'a>) -> f64 {
        let s = self.sigma.feval();
        self.valid = (0..s.size()).all(|k| s.val(k) > 0.0);
        if !self.valid {
            debug!("normal: non-positive scale, log-density is -inf");
            return f64::NEG_INFINITY;
        }
        (0..x.size())
            .map(|k| {
                let sk = s.bval(k);
                let z = (x.val(k) - m.bval(k)) / sk;
                -0.5 * z * z - sk.ln()
            })
            .sum()
    }

    fn feval_covariance(&mut self, x: ValueAdjView<'a>, m: ValueAdjView<'a>) -> f64 {
        let sigma = mat_from_view(&self.sigma.feval());
        let factor = Factorization::cholesky(sigma.as_ref());
        let n = x.size();
        let d = Mat::from_fn(n, 1, |i, _| x.val(i) - m.bval(i));
        let z = factor.solve(d.as_ref()).map(|z| vec_from_mat(z.as_ref()));
        self.valid = factor.is_valid() && z.is_some();
        let Some(z) = z.filter(|_| self.valid) else {
            debug!("normal: covariance is not positive-definite, log-density is -inf");
            self.cache = None;
            return f64::NEG_INFINITY;
        };
        let quad: f64 = (0..n).map(|i| d[(i, 0)] * z[i]).sum();
        let value = -0.5 * quad - factor.half_log_det();
        self.cache = Some(CovarianceCache { factor, z });
        value
    }

    fn beval_elementwise(&mut self, s: f64) {
        let x = self.x.view();
        let m = self.mean.view();
        let sigma = self.sigma.view();
        let mut dx: SeedBuf = SeedBuf::from_elem(0.0, x.size());
        let mut dm = SeedAccum::new(m.size());
        let mut ds = SeedAccum::new(sigma.size());
        for k in 0..x.size() {
            let sk = sigma.bval(k);
            let d = x.val(k) - m.bval(k);
            let z = d / sk;
            dx[k] = -s * d / (sk * sk);
            dm.add(k, s * d / (sk * sk));
            ds.add(k, s * (z * z - 1.0) / sk);
        }
        self.sigma.beval(ds.as_slice());
        self.mean.beval(dm.as_slice());
        self.x.beval(&dx);
    }

    fn beval_zero_children(&mut self) {
        beval_zero(&mut self.sigma);
        beval_zero(&mut self.mean);
        beval_zero(&mut self.x);
    }

    fn beval_covariance(&mut self, s: f64) {
        let Some(cache) = self.cache.as_ref() else {
            self.beval_zero_children();
            return;
        };
        let Some(inv) = cache.factor.inverse() else {
            self.beval_zero_children();
            return;
        };
        let z = &cache.z;
        let n = z.len();
        let dsigma = Mat::from_fn(n, n, |i, j| -0.5 * s * (inv[(i, j)] - z[i] * z[j]));
        let mut dm = SeedAccum::new(self.mean.shape().size());
        let mut dx: SeedBuf = SeedBuf::from_elem(0.0, n);
        for k in 0..n {
            dm.add(k, s * z[k]);
            dx[k] = -s * z[k];
        }
        self.sigma.beval(&vec_from_mat(dsigma.as_ref()));
        self.mean.beval(dm.as_slice());
        self.x.beval(&dx);
    }
}

impl<'a> ExprNode<'a> for NormalNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.x.feval();
        let m = self.mean.feval();
        let value = if self.covariance {
            self.feval_covariance(x, m)
        } else {
            self.feval_elementwise(x, m)
        };
        self.view.set_val(0, value);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        if !self.valid {
            self.beval_zero_children();
            return;
        }
        if self.covariance {
            self.beval_covariance(seed[0]);
        } else {
            self.beval_elementwise(seed[0]);
        }
    }

    fn bind_cache_size(&self) -> SizePack {
        self.x.bind_cache_size()
            + self.mean.bind_cache_size()
            + self.sigma.bind_cache_size()
            + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.x.bind_cache(cursor);
        let cursor = self.mean.bind_cache(cursor);
        let cursor = self.sigma.bind_cache(cursor);
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
