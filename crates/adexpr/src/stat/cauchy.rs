use log::debug;

use crate::error::AdError;
use crate::expr::{Expr, ExprNode, SeedAccum, SeedBuf, beval_zero};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Cauchy log-density, `sum -log(gamma + d^2 / gamma)` with `d = x - loc`.
pub struct CauchyNode<'a> {
    x: Box<Expr<'a>>,
    loc: Box<Expr<'a>>,
    scale: Box<Expr<'a>>,
    valid: bool,
    view: ValueAdjView<'a>,
}

impl<'a> CauchyNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if a parameter does not
    /// broadcast against `x`.
    pub fn new(x: Expr<'a>, loc: Expr<'a>, scale: Expr<'a>) -> Result<Self, AdError> {
        x.shape().accepts_param(loc.shape())?;
        x.shape().accepts_param(scale.shape())?;
        Ok(Self {
            x: Box::new(x),
            loc: Box::new(loc),
            scale: Box::new(scale),
            valid: false,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }
}

impl<'a> ExprNode<'a> for CauchyNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.x.feval();
        let loc = self.loc.feval();
        let scale = self.scale.feval();
        self.valid = (0..scale.size()).all(|k| scale.val(k) > 0.0);
        let value = if self.valid {
            (0..x.size())
                .map(|k| {
                    let g = scale.bval(k);
                    let d = x.val(k) - loc.bval(k);
                    -((g * g + d * d) / g).ln()
                })
                .sum()
        } else {
            debug!("cauchy: non-positive scale, log-density is -inf");
            f64::NEG_INFINITY
        };
        self.view.set_val(0, value);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        if !self.valid {
            beval_zero(&mut self.scale);
            beval_zero(&mut self.loc);
            beval_zero(&mut self.x);
            return;
        }
        let s = seed[0];
        let x = self.x.view();
        let loc = self.loc.view();
        let scale = self.scale.view();
        let mut dx: SeedBuf = SeedBuf::from_elem(0.0, x.size());
        let mut dloc = SeedAccum::new(loc.size());
        let mut dscale = SeedAccum::new(scale.size());
        for k in 0..x.size() {
            let g = scale.bval(k);
            let d = x.val(k) - loc.bval(k);
            let denom = g * g + d * d;
            dx[k] = -2.0 * s * d / denom;
            dloc.add(k, 2.0 * s * d / denom);
            dscale.add(k, s * (d * d - g * g) / (g * denom));
        }
        self.scale.beval(dscale.as_slice());
        self.loc.beval(dloc.as_slice());
        self.x.beval(&dx);
    }

    fn bind_cache_size(&self) -> SizePack {
        self.x.bind_cache_size()
            + self.loc.bind_cache_size()
            + self.scale.bind_cache_size()
            + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.x.bind_cache(cursor);
        let cursor = self.loc.bind_cache(cursor);
        let cursor = self.scale.bind_cache(cursor);
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
