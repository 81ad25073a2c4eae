//! Gradients, Hessians and Hessian-vector products via nested duals.
//!
//! Method (forward-over-forward):
//!   1. The inner tangent carries direction u, the outer tangent direction w.
//!   2. The outer tangent of the inner tangent is u^T H w.
//!
//! The function is written once, generically over [`Scalar`], and called
//! with `Dual<f64>` for first derivatives or `Dual<Dual<f64>>` for second
//! derivatives.
//!
//! # Example
//!
//! ```ignore
//! use adexpr::forward::hessian;
//! use adexpr::Scalar;
//!
//! fn f<T: Scalar>(x: &[T]) -> T {
//!     x[0] * x[0] * x[1]
//! }
//!
//! let (value, grad, h) = hessian(f, &[3.0, 2.0]);
//! assert_eq!(value, 18.0);
//! assert_eq!(grad, vec![12.0, 9.0]);
//! assert_eq!(h[(0, 1)], 6.0);
//! ```

use faer::Mat;
use log::trace;

use crate::forward::Dual;
use crate::scalar::Scalar;

type Dual2 = Dual<Dual<f64>>;

fn unit(k: usize, i: usize) -> f64 {
    if k == i { 1.0 } else { 0.0 }
}

/// Value and gradient of `f` at `x`, one forward pass per coordinate.
pub fn gradient<F>(f: F, x: &[f64]) -> (f64, Vec<f64>)
where
    F: Fn(&[Dual<f64>]) -> Dual<f64>,
{
    let n = x.len();
    let mut value = f(&x.iter().map(|&v| Dual::constant(v)).collect::<Vec<_>>()).primal();
    let mut grad = vec![0.0; n];
    for (i, g) in grad.iter_mut().enumerate() {
        let input: Vec<_> = x
            .iter()
            .enumerate()
            .map(|(k, &v)| Dual::new(v, unit(k, i)))
            .collect();
        let (primal, tangent) = f(&input).into_parts();
        value = primal;
        *g = tangent;
    }
    trace!("gradient: {n} forward passes");
    (value, grad)
}

/// Value, gradient and the full symmetric Hessian of `f` at `x`.
///
/// Evaluates `f` once per entry of the upper triangle and mirrors it.
pub fn hessian<F>(f: F, x: &[f64]) -> (f64, Vec<f64>, Mat<f64>)
where
    F: Fn(&[Dual2]) -> Dual2,
{
    let n = x.len();
    let mut value = f(&x
        .iter()
        .map(|&v| Dual2::from_f64(v))
        .collect::<Vec<_>>())
    .primal()
    .primal();
    let mut grad = vec![0.0; n];
    let mut h = Mat::<f64>::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let input: Vec<_> = x
                .iter()
                .enumerate()
                .map(|(k, &v)| {
                    Dual::new(Dual::new(v, unit(k, i)), Dual::constant(unit(k, j)))
                })
                .collect();
            let y = f(&input);
            if j == i {
                value = y.primal().primal();
                grad[i] = y.primal().tangent();
            }
            let hij = y.tangent().tangent();
            h[(i, j)] = hij;
            h[(j, i)] = hij;
        }
    }
    trace!("hessian: {} forward passes", n * (n + 1) / 2);
    (value, grad, h)
}

/// Hessian-vector product `H v` of `f` at `x`.
///
/// # Panics
///
/// If `x` and `v` differ in length.
pub fn hvp<F>(f: F, x: &[f64], v: &[f64]) -> Vec<f64>
where
    F: Fn(&[Dual2]) -> Dual2,
{
    assert_eq!(x.len(), v.len(), "hvp: point and direction differ in length");
    let n = x.len();
    let result = (0..n)
        .map(|i| {
            let input: Vec<_> = x
                .iter()
                .zip(v)
                .enumerate()
                .map(|(k, (&xk, &vk))| {
                    Dual::new(Dual::new(xk, vk), Dual::constant(unit(k, i)))
                })
                .collect();
            f(&input).tangent().tangent()
        })
        .collect();
    trace!("hvp: {n} forward passes");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rosenbrock<T: Scalar>(x: &[T]) -> T {
        let one = T::one();
        let hundred = T::from_f64(100.0);
        let a = one - x[0];
        let b = x[1] - x[0] * x[0];
        a * a + hundred * b * b
    }

    #[test]
    fn test_hvp_quadratic() {
        // f(x) = x^2, f''(x) = 2
        let hv = hvp(|x| x[0] * x[0], &[3.0], &[1.0]);
        assert_relative_eq!(hv[0], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_hvp_cubic() {
        // f(x) = x^3, f''(2) = 12
        let hv = hvp(|x| x[0] * x[0] * x[0], &[2.0], &[1.0]);
        assert_relative_eq!(hv[0], 12.0, epsilon = 1e-10);
    }

    #[test]
    fn test_hvp_with_different_v() {
        // f(x) = x^2, H v = 2 v
        let hv = hvp(|x| x[0] * x[0], &[5.0], &[3.0]);
        assert_relative_eq!(hv[0], 6.0, epsilon = 1e-10);
    }

    #[test]
    fn test_hvp_quartic_shared_subexpression() {
        // f(x) = (x^2)^2, f''(2) = 48
        let hv = hvp(
            |x| {
                let x2 = x[0] * x[0];
                x2 * x2
            },
            &[2.0],
            &[1.0],
        );
        assert_relative_eq!(hv[0], 48.0, epsilon = 1e-10);
    }

    #[test]
    fn test_hvp_sum_of_squares() {
        // f(x) = x^2 + x^2, H v = 4 v
        let hv = hvp(|x| x[0] * x[0] + x[0] * x[0], &[3.0], &[2.0]);
        assert_relative_eq!(hv[0], 8.0, epsilon = 1e-10);
    }

    #[test]
    fn test_gradient_rosenbrock() {
        let (value, grad) = gradient(rosenbrock::<Dual<f64>>, &[1.5, 2.0]);
        // a = -0.5, b = -0.25
        assert_relative_eq!(value, 0.25 + 100.0 * 0.0625, epsilon = 1e-12);
        assert_relative_eq!(grad[0], 2.0 * 0.5 - 400.0 * 1.5 * -0.25, epsilon = 1e-10);
        assert_relative_eq!(grad[1], 200.0 * -0.25, epsilon = 1e-10);
    }

    #[test]
    fn test_hessian_rosenbrock() {
        let x = [1.5, 2.0];
        let (value, grad, h) = hessian(rosenbrock::<Dual2>, &x);
        let (v1, g1) = gradient(rosenbrock::<Dual<f64>>, &x);
        assert_relative_eq!(value, v1, epsilon = 1e-12);
        assert_relative_eq!(grad[0], g1[0], epsilon = 1e-10);
        assert_relative_eq!(grad[1], g1[1], epsilon = 1e-10);

        // d2f/dx0^2 = 2 - 400 (x1 - 3 x0^2), d2f/dx0dx1 = -400 x0, d2f/dx1^2 = 200
        assert_relative_eq!(h[(0, 0)], 2.0 - 400.0 * (2.0 - 3.0 * 2.25), epsilon = 1e-8);
        assert_relative_eq!(h[(0, 1)], -600.0, epsilon = 1e-10);
        assert_relative_eq!(h[(1, 0)], -600.0, epsilon = 1e-10);
        assert_relative_eq!(h[(1, 1)], 200.0, epsilon = 1e-10);
    }

    #[test]
    fn test_hvp_matches_hessian() {
        let x = [0.3, -0.7, 1.1];
        let v = [1.0, 2.0, -0.5];
        let f = |x: &[Dual2]| (x[0] * x[1]).sin() + x[2].exp() * x[0];
        let (_, _, h) = hessian(f, &x);
        let hv = hvp(f, &x, &v);
        for i in 0..3 {
            let expected: f64 = (0..3).map(|j| h[(i, j)] * v[j]).sum();
            assert_relative_eq!(hv[i], expected, epsilon = 1e-10);
        }
    }
}
