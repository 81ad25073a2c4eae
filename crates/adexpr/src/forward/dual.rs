//! Dual numbers for forward-mode automatic differentiation.
//!
//! Forward mode propagates a tangent alongside every value. Given a
//! function f and input x with tangent v, it computes:
//!   - primal: f(x)
//!   - tangent: f'(x) * v (Jacobian-vector product)
//!
//! This is the dual of the reverse mode in [`crate::expr`], which
//! computes v^T * J_f(x). The derivative rules are the same operator
//! functors the reverse-mode nodes use, so the two modes cannot drift
//! apart.
//!
//! `Dual<T>` is itself a [`Scalar`], so it nests: `Dual<Dual<f64>>`
//! carries second derivatives.
//!
//! # Example
//!
//! ```ignore
//! use adexpr::forward::Dual;
//! use adexpr::Scalar;
//!
//! // d/dx (x sin x) at x = 2
//! let x = Dual::variable(2.0);
//! let y = x * x.sin();
//! assert!((y.tangent() - (2.0_f64.sin() + 2.0 * 2.0_f64.cos())).abs() < 1e-12);
//! ```

use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::ops::{self, BinaryOp, UnaryOp};
use crate::scalar::Scalar;

/// A value with a tangent in one direction.
#[derive(Clone, Copy, Debug)]
pub struct Dual<T: Scalar> {
    primal: T,
    tangent: T,
}

impl<T: Scalar> Dual<T> {
    pub fn new(primal: T, tangent: T) -> Self {
        Self { primal, tangent }
    }

    /// A constant: zero tangent.
    pub fn constant(primal: T) -> Self {
        Self {
            primal,
            tangent: T::zero(),
        }
    }

    /// The independent variable: unit tangent.
    pub fn variable(primal: T) -> Self {
        Self {
            primal,
            tangent: T::one(),
        }
    }

    pub fn primal(self) -> T {
        self.primal
    }

    pub fn tangent(self) -> T {
        self.tangent
    }

    /// Consume and return primal and tangent.
    pub fn into_parts(self) -> (T, T) {
        (self.primal, self.tangent)
    }

    fn unary<O: UnaryOp>(self) -> Self {
        let f = O::fmap(self.primal);
        Self {
            primal: f,
            tangent: O::bmap(self.tangent, self.primal, f),
        }
    }

    fn binary<O: BinaryOp>(self, rhs: Self) -> Self {
        let (x, y) = (self.primal, rhs.primal);
        let f = O::fmap(x, y);
        Self {
            primal: f,
            tangent: O::blmap(self.tangent, x, y, f) + O::brmap(rhs.tangent, x, y, f),
        }
    }
}

impl<T: Scalar> PartialEq for Dual<T> {
    fn eq(&self, other: &Self) -> bool {
        self.primal == other.primal
    }
}

/// Ordering looks at the primal only, so control flow in generic code
/// takes the same branch as it would on plain numbers.
impl<T: Scalar> PartialOrd for Dual<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.primal.partial_cmp(&other.primal)
    }
}

impl<T: Scalar> Add for Dual<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.binary::<ops::Add>(rhs)
    }
}

impl<T: Scalar> Sub for Dual<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.binary::<ops::Sub>(rhs)
    }
}

impl<T: Scalar> Mul for Dual<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.binary::<ops::Mul>(rhs)
    }
}

impl<T: Scalar> Div for Dual<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        self.binary::<ops::Div>(rhs)
    }
}

impl<T: Scalar> Neg for Dual<T> {
    type Output = Self;

    fn neg(self) -> Self {
        self.unary::<ops::Neg>()
    }
}

impl<T: Scalar> Scalar for Dual<T> {
    fn from_f64(value: f64) -> Self {
        Self::constant(T::from_f64(value))
    }

    fn primal(self) -> f64 {
        self.primal.primal()
    }

    fn sin(self) -> Self {
        self.unary::<ops::Sin>()
    }

    fn cos(self) -> Self {
        self.unary::<ops::Cos>()
    }

    fn tan(self) -> Self {
        self.unary::<ops::Tan>()
    }

    fn asin(self) -> Self {
        self.unary::<ops::Asin>()
    }

    fn acos(self) -> Self {
        self.unary::<ops::Acos>()
    }

    fn atan(self) -> Self {
        self.unary::<ops::Atan>()
    }

    fn sinh(self) -> Self {
        self.unary::<ops::Sinh>()
    }

    fn cosh(self) -> Self {
        self.unary::<ops::Cosh>()
    }

    fn tanh(self) -> Self {
        self.unary::<ops::Tanh>()
    }

    fn exp(self) -> Self {
        self.unary::<ops::Exp>()
    }

    fn ln(self) -> Self {
        self.unary::<ops::Log>()
    }

    fn sqrt(self) -> Self {
        self.unary::<ops::Sqrt>()
    }

    fn erf(self) -> Self {
        self.unary::<ops::Erf>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dual_constant_and_variable() {
        let c = Dual::constant(3.0);
        assert_eq!(c.tangent(), 0.0);
        let x = Dual::variable(3.0);
        assert_eq!(x.into_parts(), (3.0, 1.0));
    }

    #[test]
    fn test_dual_product_rule() {
        // d/dx (x^2 / (1 + x)) = (x^2 + 2x) / (1 + x)^2
        let x = Dual::variable(2.0);
        let y = x * x / (Dual::constant(1.0) + x);
        assert_relative_eq!(y.primal(), 4.0 / 3.0);
        assert_relative_eq!(y.tangent(), 8.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dual_unary_functions() {
        let x0: f64 = 0.4;
        let x = Dual::variable(x0);
        assert_relative_eq!(x.sin().tangent(), x0.cos(), epsilon = 1e-12);
        assert_relative_eq!(x.exp().tangent(), x0.exp(), epsilon = 1e-12);
        assert_relative_eq!(x.ln().tangent(), 1.0 / x0, epsilon = 1e-12);
        assert_relative_eq!(x.sqrt().tangent(), 0.5 / x0.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(x.tanh().tangent(), 1.0 - x0.tanh().powi(2), epsilon = 1e-12);
        assert_relative_eq!((-x).tangent(), -1.0);
    }

    #[test]
    fn test_nested_dual_second_derivative() {
        // f(x) = x^3, f'(2) = 12, f''(2) = 12
        let x = Dual::new(Dual::variable(2.0), Dual::constant(1.0));
        let y = x * x * x;
        assert_relative_eq!(y.primal().primal(), 8.0);
        assert_relative_eq!(y.primal().tangent(), 12.0);
        assert_relative_eq!(y.tangent().primal(), 12.0);
        assert_relative_eq!(y.tangent().tangent(), 12.0);
    }

    #[test]
    fn test_ordering_uses_primal() {
        let a = Dual::new(1.0, 100.0);
        let b = Dual::new(2.0, -100.0);
        assert!(a < b);
        assert_eq!(a, Dual::new(1.0, 0.0));
    }
}
