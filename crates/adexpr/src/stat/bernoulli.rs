use log::debug;

use crate::error::AdError;
use crate::expr::{Expr, ExprNode, SeedAccum, beval_zero, zero_seed};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Log-mass of one observation.
///
/// Inside `(0, 1)` this is `log p` or `log(1 - p)`; at the boundary it is
/// `0` when the data agrees with the certain outcome. Anything else,
/// including `p` outside `[0, 1]` or data other than 0/1, is `-inf`.
fn log_mass(x: f64, p: f64) -> f64 {
    let certain = |outcome: f64| if x == outcome { 0.0 } else { f64::NEG_INFINITY };
    if p > 0.0 && p < 1.0 {
        if x == 0.0 {
            (1.0 - p).ln()
        } else if x == 1.0 {
            p.ln()
        } else {
            f64::NEG_INFINITY
        }
    } else if p == 0.0 {
        certain(0.0)
    } else if p == 1.0 {
        certain(1.0)
    } else {
        f64::NEG_INFINITY
    }
}

/// Bernoulli log-mass summed over the data.
pub struct BernoulliNode<'a> {
    x: Box<Expr<'a>>,
    p: Box<Expr<'a>>,
    valid: bool,
    view: ValueAdjView<'a>,
}

impl<'a> BernoulliNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if `p` does not broadcast
    /// against `x`.
    pub fn new(x: Expr<'a>, p: Expr<'a>) -> Result<Self, AdError> {
        x.shape().accepts_param(p.shape())?;
        Ok(Self {
            x: Box::new(x),
            p: Box::new(p),
            valid: false,
            view: ValueAdjView::unbound(Shape::Scalar),
        })
    }
}

impl<'a> ExprNode<'a> for BernoulliNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.x.feval();
        let p = self.p.feval();
        let value: f64 = (0..x.size()).map(|k| log_mass(x.val(k), p.bval(k))).sum();
        self.valid = value.is_finite();
        if !self.valid {
            debug!("bernoulli: impossible data or probability outside [0, 1]");
        }
        self.view.set_val(0, value);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        if !self.valid {
            beval_zero(&mut self.p);
            beval_zero(&mut self.x);
            return;
        }
        let s = seed[0];
        let x = self.x.view();
        let p = self.p.view();
        let mut dp = SeedAccum::new(p.size());
        for k in 0..x.size() {
            let pk = p.bval(k);
            // boundary probabilities have no interior derivative
            if pk <= 0.0 || pk >= 1.0 {
                continue;
            }
            if x.val(k) == 1.0 {
                dp.add(k, s / pk);
            } else {
                dp.add(k, -s / (1.0 - pk));
            }
        }
        self.p.beval(dp.as_slice());
        self.x.beval(&zero_seed(x.size()));
    }

    fn bind_cache_size(&self) -> SizePack {
        self.x.bind_cache_size() + self.p.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.x.bind_cache(cursor);
        let cursor = self.p.bind_cache(cursor);
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_mass() {
        assert_relative_eq!(log_mass(1.0, 0.25), 0.25_f64.ln());
        assert_relative_eq!(log_mass(0.0, 0.25), 0.75_f64.ln());
        assert_eq!(log_mass(0.5, 0.25), f64::NEG_INFINITY);
        assert_eq!(log_mass(0.0, 0.0), 0.0);
        assert_eq!(log_mass(1.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(log_mass(1.0, 1.0), 0.0);
        assert_eq!(log_mass(1.0, 1.5), f64::NEG_INFINITY);
        assert_eq!(log_mass(0.0, -0.1), f64::NEG_INFINITY);
    }
}
