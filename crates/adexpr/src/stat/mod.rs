//! Log-density nodes.
//!
//! Each node evaluates to a scalar: the log-density of the data summed
//! over every element, up to an additive constant that does not depend on
//! the inputs. Parameters broadcast against the data: each one is either
//! a scalar or has exactly the data's shape.
//!
//! Invalid parameters (a non-positive scale, a probability outside
//! `[0, 1]`, a matrix that is not positive-definite) make the value `-inf`
//! and the backward pass only forwards zero seeds to the operands, leaving
//! leaf adjoints untouched. They are never reported as errors.

mod bernoulli;
mod cauchy;
mod normal;
mod uniform;
mod wishart;

use crate::error::AdError;
use crate::expr::{Expr, IntoExpr};

pub use bernoulli::BernoulliNode;
pub use cauchy::CauchyNode;
pub use normal::NormalNode;
pub use uniform::UniformNode;
pub use wishart::WishartNode;

/// Normal log-density of `x` with location `mean` and scale `sigma`.
///
/// When `sigma` is a matrix it is taken as the covariance of the vector
/// `x` and factorized by Cholesky; otherwise it is an elementwise
/// standard deviation.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] or [`AdError::NotSquareMatrix`]
/// when the parameters do not fit `x`.
pub fn normal_adj_log_pdf<'a>(
    x: impl IntoExpr<'a>,
    mean: impl IntoExpr<'a>,
    sigma: impl IntoExpr<'a>,
) -> Result<Expr<'a>, AdError> {
    NormalNode::new(x.into_expr(), mean.into_expr(), sigma.into_expr()).map(Expr::Normal)
}

/// Cauchy log-density with location `loc` and scale `scale`.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] when a parameter does not fit `x`.
pub fn cauchy_adj_log_pdf<'a>(
    x: impl IntoExpr<'a>,
    loc: impl IntoExpr<'a>,
    scale: impl IntoExpr<'a>,
) -> Result<Expr<'a>, AdError> {
    CauchyNode::new(x.into_expr(), loc.into_expr(), scale.into_expr()).map(Expr::Cauchy)
}

/// Bernoulli log-mass of 0/1 data `x` with success probability `p`.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] when `p` does not fit `x`.
pub fn bernoulli_adj_log_pdf<'a>(
    x: impl IntoExpr<'a>,
    p: impl IntoExpr<'a>,
) -> Result<Expr<'a>, AdError> {
    BernoulliNode::new(x.into_expr(), p.into_expr()).map(Expr::Bernoulli)
}

/// Wishart log-density of the matrix `x` with scale matrix `v` and `n`
/// degrees of freedom.
///
/// # Errors
///
/// Returns [`AdError::NotSquareMatrix`] or [`AdError::ShapeMismatch`]
/// unless `x` and `v` are square matrices of equal size.
pub fn wishart_adj_log_pdf<'a>(
    x: impl IntoExpr<'a>,
    v: impl IntoExpr<'a>,
    n: f64,
) -> Result<Expr<'a>, AdError> {
    WishartNode::new(x.into_expr(), v.into_expr(), n).map(Expr::Wishart)
}

/// Uniform log-density of `x` on the open interval `(min, max)`.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] when a bound does not fit `x`.
pub fn uniform_adj_log_pdf<'a>(
    x: impl IntoExpr<'a>,
    min: impl IntoExpr<'a>,
    max: impl IntoExpr<'a>,
) -> Result<Expr<'a>, AdError> {
    UniformNode::new(x.into_expr(), min.into_expr(), max.into_expr()).map(Expr::Uniform)
}
