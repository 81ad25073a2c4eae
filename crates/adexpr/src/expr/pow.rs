use crate::expr::{Expr, ExprNode, SeedBuf, zero_seed};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// `x^n` for an integer `n`, by repeated squaring.
///
/// `0^0 = 1`, and a zero base with a negative exponent gives `+inf`.
pub fn pow_scalar(x: f64, n: i32) -> f64 {
    fn pos(x: f64, n: u32) -> f64 {
        match n {
            0 => 1.0,
            1 => x,
            _ => {
                let half = pos(x, n / 2);
                if n % 2 == 0 { half * half } else { half * half * x }
            }
        }
    }

    if n >= 0 {
        pos(x, n.unsigned_abs())
    } else if x == 0.0 {
        f64::INFINITY
    } else {
        pos(1.0 / x, n.unsigned_abs())
    }
}

/// Elementwise integer power.
pub struct PowNode<'a> {
    exponent: i32,
    expr: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> PowNode<'a> {
    pub fn new(exponent: i32, expr: Expr<'a>) -> Self {
        let shape = expr.shape().dense();
        Self {
            exponent,
            expr: Box::new(expr),
            view: ValueAdjView::unbound(shape),
        }
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }
}

impl<'a> ExprNode<'a> for PowNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.expr.feval();
        for k in 0..self.view.size() {
            self.view.set_val(k, pow_scalar(x.val(k), self.exponent));
        }
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let n = self.exponent;
        match n {
            0 => self.expr.beval(&zero_seed(seed.len())),
            1 => self.expr.beval(seed),
            _ => {
                self.view.set_adj_from(seed);
                let x = self.expr.view();
                let nf = f64::from(n);
                let child: SeedBuf = seed
                    .iter()
                    .enumerate()
                    .map(|(k, &s)| {
                        let (xk, fk) = (x.val(k), self.view.val(k));
                        if s == 0.0 {
                            0.0
                        } else if xk != 0.0 {
                            // n x^(n-1) = n f / x
                            nf * s * fk / xk
                        } else if n > 0 {
                            0.0
                        } else {
                            f64::NEG_INFINITY
                        }
                    })
                    .collect();
                self.expr.beval(&child);
            }
        }
    }

    fn bind_cache_size(&self) -> SizePack {
        self.expr.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        let size = self.view.size();
        match self.exponent {
            0 | 1 => SizePack::new(size, 0),
            _ => SizePack::new(size, size),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pow_scalar() {
        assert_eq!(pow_scalar(0.0, 0), 1.0);
        assert_eq!(pow_scalar(2.0, 10), 1024.0);
        assert_eq!(pow_scalar(-3.0, 3), -27.0);
        assert_eq!(pow_scalar(0.0, -1), f64::INFINITY);
        assert_relative_eq!(pow_scalar(2.0, -2), 0.25);
        assert_relative_eq!(pow_scalar(1.1, 7), 1.1_f64.powi(7), epsilon = 1e-12);
    }
}
