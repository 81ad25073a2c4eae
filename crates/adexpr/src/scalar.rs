//! Scalar trait shared by reverse-mode values and forward-mode duals.

use std::f64::consts::FRAC_2_SQRT_PI;
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Number type the operator functors are written against.
///
/// Reverse-mode graphs always evaluate in `f64`. Forward-mode duals
/// implement this trait as well, so every functor doubles as the
/// derivative rule for [`Dual`](crate::forward::Dual) arithmetic.
pub trait Scalar:
    Copy
    + Debug
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self {
        Self::from_f64(1.0)
    }

    /// Lift a plain number.
    fn from_f64(value: f64) -> Self;

    /// The underlying `f64` value, ignoring any derivative parts.
    fn primal(self) -> f64;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn erf(self) -> Self;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn primal(self) -> f64 {
        self
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tan(self) -> Self {
        f64::tan(self)
    }

    fn asin(self) -> Self {
        f64::asin(self)
    }

    fn acos(self) -> Self {
        f64::acos(self)
    }

    fn atan(self) -> Self {
        f64::atan(self)
    }

    fn sinh(self) -> Self {
        f64::sinh(self)
    }

    fn cosh(self) -> Self {
        f64::cosh(self)
    }

    fn tanh(self) -> Self {
        f64::tanh(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn erf(self) -> Self {
        erf(self)
    }
}

/// Error function.
///
/// Uses the Maclaurin series below `|x| = 3` and the Laplace continued
/// fraction for `erfc` above it. Both agree with the exact value to
/// roughly machine precision.
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    let ax = x.abs();
    let r = if ax < 3.0 {
        let x2 = ax * ax;
        let mut term = ax;
        let mut sum = ax;
        for n in 1..200 {
            let n = n as f64;
            term *= -x2 / n;
            let t = term / (2.0 * n + 1.0);
            sum += t;
            if t.abs() <= f64::EPSILON * 1e-2 * sum.abs() {
                break;
            }
        }
        FRAC_2_SQRT_PI * sum
    } else if ax < 6.0 {
        1.0 - erfc_continued_fraction(ax)
    } else {
        1.0
    };
    r.copysign(x)
}

/// `erfc(x)` for `x >= 3`, evaluated bottom-up.
fn erfc_continued_fraction(x: f64) -> f64 {
    let mut f = x;
    for k in (1..=80).rev() {
        f = x + (k as f64 * 0.5) / f;
    }
    0.5 * FRAC_2_SQRT_PI * (-x * x).exp() / f
}
