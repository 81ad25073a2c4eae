//! Binding and evaluation drivers.
//!
//! ```ignore
//! let mut expr = normal_adj_log_pdf(&x, &mu, &sigma)?;
//! let ws = Workspace::for_expr(&expr);
//! ws.bind(&mut expr)?;
//! let value = autodiff(&mut expr)?;
//! ```
//!
//! Leaf adjoints accumulate across calls. Reset them with
//! [`Var::reset_adj`](crate::Var::reset_adj) between independent
//! gradient evaluations; intermediate adjoints are overwritten on every
//! backward pass.

use faer::Mat;
use log::{debug, trace};

use crate::error::AdError;
use crate::expr::{Expr, ExprNode};
use crate::value::{SizePack, ValueAdjView, Workspace};
use crate::var::Var;

/// Buffer requirement of an expression.
pub fn bind_cache_size(expr: &Expr<'_>) -> SizePack {
    expr.bind_cache_size()
}

impl Workspace {
    /// Workspace exactly large enough for `expr`.
    pub fn for_expr(expr: &Expr<'_>) -> Self {
        Self::new(expr.bind_cache_size())
    }

    /// Bind every node of `expr` to a slot in this workspace.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::WorkspaceTooSmall`] if the buffers cannot hold
    /// the expression.
    pub fn bind<'a>(&'a self, expr: &mut Expr<'a>) -> Result<(), AdError> {
        let needed = expr.bind_cache_size();
        let available = self.size();
        if !needed.fits_in(available) {
            return Err(AdError::WorkspaceTooSmall { needed, available });
        }
        debug!("binding {} expression: {needed} into {available}", expr.kind());
        let cursor = expr.bind_cache(self.cursor());
        trace!("bind finished at offset {}", cursor.offset());
        Ok(())
    }
}

/// Forward pass only.
pub fn evaluate<'a>(expr: &mut Expr<'a>) -> ValueAdjView<'a> {
    trace!("forward pass over {}", expr.kind());
    expr.feval()
}

/// Backward pass only, seeding the root with `seed`. Call after
/// [`evaluate`].
///
/// # Errors
///
/// Returns [`AdError::SizeMismatch`] if `seed` does not have one entry per
/// element of the root.
pub fn evaluate_adj(expr: &mut Expr<'_>, seed: &[f64]) -> Result<(), AdError> {
    let expected = expr.shape().size();
    if seed.len() != expected {
        return Err(AdError::SizeMismatch {
            expected,
            actual: seed.len(),
        });
    }
    trace!("backward pass over {}", expr.kind());
    expr.beval(seed);
    Ok(())
}

/// Forward pass, then a backward pass seeded with `1`. Returns the value.
///
/// # Errors
///
/// Returns [`AdError::NotScalar`] unless the root is a scalar.
pub fn autodiff(expr: &mut Expr<'_>) -> Result<f64, AdError> {
    let shape = expr.shape();
    if !shape.is_scalar() {
        return Err(AdError::NotScalar { shape });
    }
    let value = evaluate(expr).scalar();
    evaluate_adj(expr, &[1.0])?;
    Ok(value)
}

/// Forward pass, then a backward pass seeded with `seed`. Returns a view
/// of the root value.
///
/// # Errors
///
/// Returns [`AdError::SizeMismatch`] if `seed` does not match the root.
pub fn autodiff_with_seed<'a>(
    expr: &mut Expr<'a>,
    seed: &[f64],
) -> Result<ValueAdjView<'a>, AdError> {
    let value = evaluate(expr);
    evaluate_adj(expr, seed)?;
    Ok(value)
}

/// Fresh reverse sweep; returns the value and the adjoints of `vars`
/// flattened in order.
fn gradient_at(expr: &mut Expr<'_>, vars: &[&Var]) -> Result<(f64, Vec<f64>), AdError> {
    for var in vars {
        var.reset_adj();
    }
    let value = autodiff(expr)?;
    Ok((value, vars.iter().flat_map(|v| v.adjoints()).collect()))
}

/// Value, gradient and Hessian of a bound scalar expression with respect to
/// the elements of `vars`, flattened in order.
///
/// Column `k` of the Hessian is the central difference of the reverse-mode
/// gradients at `x +- step * e_k`; the result is symmetrized. Leaf values
/// are restored, and on return the adjoints of `vars` hold the gradient at
/// `x`. Leaves not listed in `vars` keep accumulating adjoints.
///
/// # Errors
///
/// - [`AdError::NotScalar`] unless the root is a scalar.
/// - [`AdError::InvalidOperation`] unless `step` is positive and finite.
pub fn expr_hessian(
    expr: &mut Expr<'_>,
    vars: &[&Var],
    step: f64,
) -> Result<(f64, Vec<f64>, Mat<f64>), AdError> {
    let shape = expr.shape();
    if !shape.is_scalar() {
        return Err(AdError::NotScalar { shape });
    }
    if !(step > 0.0 && step.is_finite()) {
        return Err(AdError::InvalidOperation(format!(
            "hessian step must be positive and finite, got {step}"
        )));
    }

    let n: usize = vars.iter().map(|v| v.size()).sum();
    let mut h = Mat::<f64>::zeros(n, n);
    let mut col = 0;
    for var in vars {
        let x = var.values();
        let mut shifted = x.clone();
        for j in 0..x.len() {
            shifted[j] = x[j] + step;
            var.set_values(&shifted)?;
            let (_, plus) = gradient_at(expr, vars)?;

            shifted[j] = x[j] - step;
            var.set_values(&shifted)?;
            let (_, minus) = gradient_at(expr, vars)?;

            shifted[j] = x[j];
            var.set_values(&x)?;
            for (row, (gp, gm)) in plus.iter().zip(&minus).enumerate() {
                h[(row, col)] = (gp - gm) / (2.0 * step);
            }
            col += 1;
        }
    }
    for i in 0..n {
        for j in 0..i {
            let mean = 0.5 * (h[(i, j)] + h[(j, i)]);
            h[(i, j)] = mean;
            h[(j, i)] = mean;
        }
    }
    trace!("expr_hessian: {} reverse sweeps over {}", 2 * n + 1, expr.kind());

    let (value, grad) = gradient_at(expr, vars)?;
    Ok((value, grad, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::Var;
    use crate::{sin, sum};

    #[test]
    fn test_bind_rejects_small_workspace() {
        let x = Var::scalar(1.0);
        let mut expr = sin(&x) * &x;
        let ws = Workspace::new(SizePack::new(1, 1));
        assert!(matches!(
            ws.bind(&mut expr),
            Err(AdError::WorkspaceTooSmall { .. })
        ));
    }

    #[test]
    fn test_autodiff_requires_scalar() {
        let x = Var::vector(vec![1.0, 2.0]);
        let mut expr = sin(&x);
        let ws = Workspace::for_expr(&expr);
        ws.bind(&mut expr).unwrap();
        assert!(matches!(autodiff(&mut expr), Err(AdError::NotScalar { .. })));

        let v = autodiff_with_seed(&mut expr, &[1.0, 0.0]).unwrap();
        assert_eq!(v.values(), vec![1.0_f64.sin(), 2.0_f64.sin()]);
        assert_eq!(x.adjoints(), vec![1.0_f64.cos(), 0.0]);
        assert!(evaluate_adj(&mut expr, &[1.0]).is_err());
    }

    #[test]
    fn test_expr_hessian_rejects_bad_input() {
        let x = Var::vector(vec![1.0, 2.0]);
        let mut expr = sin(&x);
        let ws = Workspace::for_expr(&expr);
        ws.bind(&mut expr).unwrap();
        assert!(matches!(
            expr_hessian(&mut expr, &[&x], 1e-5),
            Err(AdError::NotScalar { .. })
        ));

        let mut expr = sum(sin(&x));
        let ws = Workspace::for_expr(&expr);
        ws.bind(&mut expr).unwrap();
        for step in [0.0, -1.0, f64::NAN] {
            assert!(expr_hessian(&mut expr, &[&x], step).is_err());
        }
    }

    #[test]
    fn test_expr_hessian_of_sin_sum() {
        let x = Var::vector(vec![0.3, -1.2]);
        let mut expr = sum(sin(&x));
        let ws = Workspace::for_expr(&expr);
        ws.bind(&mut expr).unwrap();

        let (value, grad, h) = expr_hessian(&mut expr, &[&x], 1e-5).unwrap();
        assert!((value - (0.3_f64.sin() + (-1.2_f64).sin())).abs() < 1e-14);
        assert_eq!(grad, vec![0.3_f64.cos(), (-1.2_f64).cos()]);
        assert!((h[(0, 0)] + 0.3_f64.sin()).abs() < 1e-6);
        assert!((h[(1, 1)] - 1.2_f64.sin()).abs() < 1e-6);
        assert_eq!(h[(0, 1)], 0.0);
        // leaves are restored and hold the gradient at x
        assert_eq!(x.values(), vec![0.3, -1.2]);
        assert_eq!(x.adjoints(), grad);
    }

    #[test]
    fn test_workspace_matches_size() {
        let x = Var::vector(vec![1.0, 2.0, 3.0]);
        let expr = sum(sin(&x));
        // sin: 3 values + 3 adjoints, sum: 1 value
        assert_eq!(bind_cache_size(&expr), SizePack::new(4, 3));
        assert_eq!(Workspace::for_expr(&expr).size(), SizePack::new(4, 3));
    }
}
