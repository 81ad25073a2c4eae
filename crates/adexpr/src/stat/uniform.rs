use log::debug;

use crate::error::AdError;
use crate::expr::{Expr, ExprNode, SeedAccum, beval_zero, zero_seed};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Uniform log-density on `(min, max)`, `sum -log(max - min)`.
///
/// The support is open: data on a bound is outside it.
pub struct UniformNode<'a> {
    x: Box<Expr<'a>>,
    min: Box<Expr<'a>>,
    max: Box<Expr<'a>>,
    valid: bool,
    view: ValueAdjView<'a>,
}

impl<'a> UniformNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if a bound does not broadcast
    /// against `x`.
    pub fn new(x: Expr<'a>, min: Expr<'a>, max: Expr<'a>) -> Result<Self, AdError> {
        x.shape().accepts_param(min.shape())?;
        x.shape().accepts_param(max.shape())?;
        Ok(Self {
            x: Box::new(x),
            min: Box::new(min),
            max: Box::new(max),
            valid: false,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }
}

impl<'a> ExprNode<'a> for UniformNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.x.feval();
        let lo = self.min.feval();
        let hi = self.max.feval();
        self.valid = (0..x.size()).all(|k| lo.bval(k) < x.val(k) && x.val(k) < hi.bval(k));
        let value = if self.valid {
            (0..x.size()).map(|k| -(hi.bval(k) - lo.bval(k)).ln()).sum()
        } else {
            debug!("uniform: data outside the support, log-density is -inf");
            f64::NEG_INFINITY
        };
        self.view.set_val(0, value);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        if !self.valid {
            beval_zero(&mut self.max);
            beval_zero(&mut self.min);
            beval_zero(&mut self.x);
            return;
        }
        let s = seed[0];
        let n = self.x.shape().size();
        let lo = self.min.view();
        let hi = self.max.view();
        let mut dmin = SeedAccum::new(lo.size());
        let mut dmax = SeedAccum::new(hi.size());
        for k in 0..n {
            let width = hi.bval(k) - lo.bval(k);
            dmin.add(k, s / width);
            dmax.add(k, -s / width);
        }
        self.max.beval(dmax.as_slice());
        self.min.beval(dmin.as_slice());
        self.x.beval(&zero_seed(n));
    }

    fn bind_cache_size(&self) -> SizePack {
        self.x.bind_cache_size()
            + self.min.bind_cache_size()
            + self.max.bind_cache_size()
            + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.x.bind_cache(cursor);
        let cursor = self.min.bind_cache(cursor);
        let cursor = self.max.bind_cache(cursor);
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
