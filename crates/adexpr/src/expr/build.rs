//! Building expressions.
//!
//! Arithmetic uses the `std::ops` traits on [`Expr`], [`VarView`] and
//! `&Var`, with `f64` accepted on either side. Everything else is a free
//! function or a method. Operations whose operands are all constants are
//! folded into a single [`Constant`] on the spot.
//!
//! Fallible builders return `Result`. The operator traits cannot, so they
//! panic with the [`AdError`] message on a shape mismatch.

use crate::backend::LogDetMethod;
use crate::error::AdError;
use crate::expr::{
    BinaryNode, Constant, DetNode, DotNode, EqNode, Expr, ExprNode, ForEachNode, GlueNode,
    IfElseNode, LogDetNode, NormNode, OpEqNode, PowNode, ProdElemNode, ProdIterNode,
    SumElemNode, SumIterNode, TransposeNode, UnaryNode, pow_scalar,
};
use crate::ops::{BinaryFn, UnaryFn};
use crate::shape::Shape;
use crate::var::{Var, VarView};

/// Conversion into an expression operand.
pub trait IntoExpr<'a> {
    fn into_expr(self) -> Expr<'a>;
}

impl<'a> IntoExpr<'a> for Expr<'a> {
    fn into_expr(self) -> Expr<'a> {
        self
    }
}

impl<'a, 'b: 'a> IntoExpr<'a> for VarView<'b> {
    fn into_expr(self) -> Expr<'a> {
        Expr::Var(self)
    }
}

impl<'a, 'b: 'a> IntoExpr<'a> for &'b Var {
    fn into_expr(self) -> Expr<'a> {
        Expr::Var(self.view())
    }
}

impl<'a> IntoExpr<'a> for Constant<'a> {
    fn into_expr(self) -> Expr<'a> {
        Expr::Constant(self)
    }
}

impl<'a> IntoExpr<'a> for f64 {
    fn into_expr(self) -> Expr<'a> {
        Expr::Constant(Constant::scalar(self))
    }
}

#[track_caller]
fn or_panic<T>(result: Result<T, AdError>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("{e}"),
    }
}

/// Scalar constant.
pub fn constant<'a>(value: f64) -> Expr<'a> {
    Expr::Constant(Constant::scalar(value))
}

/// Constant column vector.
pub fn constant_vector<'a>(values: Vec<f64>) -> Expr<'a> {
    let shape = Shape::Vector(values.len());
    Expr::Constant(Constant::from_fn(shape, |k| values[k]))
}

/// Constant `rows x cols` matrix from column-major data.
///
/// # Errors
///
/// Returns [`AdError::SizeMismatch`] if `data.len() != rows * cols`.
pub fn constant_matrix<'a>(rows: usize, cols: usize, data: Vec<f64>) -> Result<Expr<'a>, AdError> {
    Constant::new(data, Shape::Matrix(rows, cols)).map(Expr::Constant)
}

pub(crate) fn unary<'a>(op: UnaryFn, x: impl IntoExpr<'a>) -> Expr<'a> {
    let x = x.into_expr();
    match x.as_constant() {
        Some(c) => Expr::Constant(Constant::from_fn(x.shape().dense(), |k| op.fmap(c.bval(k)))),
        None => Expr::Unary(UnaryNode::new(op, x)),
    }
}

pub(crate) fn try_binary<'a>(
    op: BinaryFn,
    lhs: impl IntoExpr<'a>,
    rhs: impl IntoExpr<'a>,
) -> Result<Expr<'a>, AdError> {
    let (lhs, rhs) = (lhs.into_expr(), rhs.into_expr());
    if let (Some(x), Some(y)) = (lhs.as_constant(), rhs.as_constant()) {
        let shape = lhs.shape().broadcast(rhs.shape())?;
        return Ok(Expr::Constant(Constant::from_fn(shape, |k| {
            op.fmap(x.bval(k), y.bval(k))
        })));
    }
    BinaryNode::new(op, lhs, rhs).map(Expr::Binary)
}

#[track_caller]
pub(crate) fn binary<'a>(op: BinaryFn, lhs: impl IntoExpr<'a>, rhs: impl IntoExpr<'a>) -> Expr<'a> {
    or_panic(try_binary(op, lhs, rhs))
}

macro_rules! unary_fn {
    ($($(#[$doc:meta])* $name:ident => $op:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name<'a>(x: impl IntoExpr<'a>) -> Expr<'a> {
                unary(UnaryFn::$op, x)
            }
        )*
    };
}

unary_fn! {
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    sinh => Sinh,
    cosh => Cosh,
    tanh => Tanh,
    exp => Exp,
    /// Natural logarithm.
    log => Log,
    sqrt => Sqrt,
    erf => Erf,
    /// Logistic function `1 / (1 + e^-x)`.
    sigmoid => Sigmoid,
}

/// `x^N` for a compile-time integer exponent.
///
/// `pow::<0>` is the constant 1 and `pow::<1>` is the identity, both
/// without an adjoint slot.
pub fn pow<'a, const N: i32>(x: impl IntoExpr<'a>) -> Expr<'a> {
    let x = x.into_expr();
    match x.as_constant() {
        Some(c) => Expr::Constant(Constant::from_fn(x.shape().dense(), |k| {
            pow_scalar(c.bval(k), N)
        })),
        None => Expr::Pow(PowNode::new(N, x)),
    }
}

/// Matrix product `lhs * rhs`, with `rhs` a vector or matrix.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] or
/// [`AdError::InnerDimensionMismatch`] for incompatible operands.
pub fn dot<'a>(lhs: impl IntoExpr<'a>, rhs: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
    DotNode::new(lhs.into_expr(), rhs.into_expr()).map(Expr::Dot)
}

/// Sum of every element.
pub fn sum<'a>(x: impl IntoExpr<'a>) -> Expr<'a> {
    let x = x.into_expr();
    match x.as_constant() {
        Some(c) => constant(c.values().iter().sum()),
        None => Expr::SumElem(SumElemNode::new(x)),
    }
}

/// Product of every element.
pub fn prod<'a>(x: impl IntoExpr<'a>) -> Expr<'a> {
    let x = x.into_expr();
    match x.as_constant() {
        Some(c) => constant(c.values().iter().product()),
        None => Expr::ProdElem(ProdElemNode::new(x)),
    }
}

/// Sum of `f(item)` over a sequence. An empty sequence sums to `0`.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] if the terms differ in shape.
pub fn sum_iter<'a, I, F, E>(items: I, mut f: F) -> Result<Expr<'a>, AdError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> E,
    E: IntoExpr<'a>,
{
    let terms = items.into_iter().map(|item| f(item).into_expr()).collect();
    SumIterNode::new(terms).map(Expr::SumIter)
}

/// Product of `f(item)` over a sequence. An empty sequence gives `1`.
///
/// # Errors
///
/// Returns [`AdError::ShapeMismatch`] if the terms differ in shape.
pub fn prod_iter<'a, I, F, E>(items: I, mut f: F) -> Result<Expr<'a>, AdError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> E,
    E: IntoExpr<'a>,
{
    let terms = items.into_iter().map(|item| f(item).into_expr()).collect();
    ProdIterNode::new(terms).map(Expr::ProdIter)
}

/// Squared Euclidean norm.
pub fn norm<'a>(x: impl IntoExpr<'a>) -> Expr<'a> {
    Expr::Norm(NormNode::new(x.into_expr()))
}

pub fn transpose<'a>(x: impl IntoExpr<'a>) -> Expr<'a> {
    Expr::Transpose(TransposeNode::new(x.into_expr()))
}

/// Evaluate `first` for its effects, then behave as `second`.
pub fn glue<'a>(first: impl IntoExpr<'a>, second: impl IntoExpr<'a>) -> Expr<'a> {
    Expr::Glue(GlueNode::new(first.into_expr(), second.into_expr()))
}

/// Evaluate `f(item)` for every item in order; behaves as the last one.
///
/// # Errors
///
/// Returns [`AdError::InvalidOperation`] for an empty sequence.
pub fn for_each<'a, I, F, E>(items: I, mut f: F) -> Result<Expr<'a>, AdError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> E,
    E: IntoExpr<'a>,
{
    let exprs = items.into_iter().map(|item| f(item).into_expr()).collect();
    ForEachNode::new(exprs).map(Expr::ForEach)
}

/// `then` when `cond` is nonzero, else `otherwise`.
///
/// # Errors
///
/// Returns [`AdError::NotScalar`] for a non-scalar condition and
/// [`AdError::ShapeMismatch`] if the branches differ in shape.
pub fn if_else<'a>(
    cond: impl IntoExpr<'a>,
    then: impl IntoExpr<'a>,
    otherwise: impl IntoExpr<'a>,
) -> Result<Expr<'a>, AdError> {
    let (cond, then, otherwise) = (cond.into_expr(), then.into_expr(), otherwise.into_expr());
    let node = IfElseNode::new(cond, then, otherwise)?;
    Ok(node.fold().unwrap_or_else(Expr::IfElse))
}

/// `log |det x|`.
///
/// # Errors
///
/// Returns [`AdError::NotSquareMatrix`] unless `x` is square.
pub fn log_det<'a>(x: impl IntoExpr<'a>, method: LogDetMethod) -> Result<Expr<'a>, AdError> {
    LogDetNode::new(x.into_expr(), method).map(Expr::LogDet)
}

/// `det x`.
///
/// # Errors
///
/// Returns [`AdError::NotSquareMatrix`] unless `x` is square.
pub fn det<'a>(x: impl IntoExpr<'a>, method: LogDetMethod) -> Result<Expr<'a>, AdError> {
    DetNode::new(x.into_expr(), method).map(Expr::Det)
}

macro_rules! comparison_methods {
    ($($(#[$doc:meta])* $name:ident => $op:ident),* $(,)?) => {
        impl<'a> Expr<'a> {
            $(
                $(#[$doc])*
                ///
                /// # Panics
                ///
                /// Panics if the operands cannot be broadcast.
                #[track_caller]
                pub fn $name(self, rhs: impl IntoExpr<'a>) -> Expr<'a> {
                    binary(BinaryFn::$op, self, rhs)
                }
            )*
        }
    };
}

comparison_methods! {
    /// `1` where `self < rhs`, else `0`.
    less_than => LessThan,
    /// `1` where `self <= rhs`, else `0`.
    less_eq => LessThanEq,
    /// `1` where `self > rhs`, else `0`.
    greater_than => GreaterThan,
    /// `1` where `self >= rhs`, else `0`.
    greater_eq => GreaterThanEq,
    /// `1` where `self == rhs`, else `0`.
    equal_to => Equal,
    /// `1` where `self != rhs`, else `0`.
    not_equal_to => NotEqual,
    /// `1` where both operands are nonzero.
    and => LogicalAnd,
    /// `1` where either operand is nonzero.
    or => LogicalOr,
}

impl<'a> VarView<'a> {
    /// `self = expr`, making this view a placeholder for `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if the shapes differ.
    pub fn assign(self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        EqNode::new(self, expr.into_expr()).map(Expr::Eq)
    }

    /// `self += expr`.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] unless `expr` is a scalar or
    /// has this variable's shape.
    pub fn add_eq(self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        OpEqNode::new(BinaryFn::Add, self, expr.into_expr()).map(Expr::OpEq)
    }

    /// `self -= expr`. Errors as [`add_eq`](Self::add_eq).
    pub fn sub_eq(self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        OpEqNode::new(BinaryFn::Sub, self, expr.into_expr()).map(Expr::OpEq)
    }

    /// `self *= expr`. Errors as [`add_eq`](Self::add_eq).
    pub fn mul_eq(self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        OpEqNode::new(BinaryFn::Mul, self, expr.into_expr()).map(Expr::OpEq)
    }

    /// `self /= expr`. Errors as [`add_eq`](Self::add_eq).
    pub fn div_eq(self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        OpEqNode::new(BinaryFn::Div, self, expr.into_expr()).map(Expr::OpEq)
    }
}

impl Var {
    /// See [`VarView::assign`].
    pub fn assign<'a>(&'a self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        self.view().assign(expr)
    }

    /// See [`VarView::add_eq`].
    pub fn add_eq<'a>(&'a self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        self.view().add_eq(expr)
    }

    /// See [`VarView::sub_eq`].
    pub fn sub_eq<'a>(&'a self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        self.view().sub_eq(expr)
    }

    /// See [`VarView::mul_eq`].
    pub fn mul_eq<'a>(&'a self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        self.view().mul_eq(expr)
    }

    /// See [`VarView::div_eq`].
    pub fn div_eq<'a>(&'a self, expr: impl IntoExpr<'a>) -> Result<Expr<'a>, AdError> {
        self.view().div_eq(expr)
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<'a, R: IntoExpr<'a>> std::ops::$trait<R> for Expr<'a> {
            type Output = Expr<'a>;

            #[track_caller]
            fn $method(self, rhs: R) -> Expr<'a> {
                binary(BinaryFn::$op, self, rhs)
            }
        }

        impl<'a, R: IntoExpr<'a>> std::ops::$trait<R> for VarView<'a> {
            type Output = Expr<'a>;

            #[track_caller]
            fn $method(self, rhs: R) -> Expr<'a> {
                binary(BinaryFn::$op, self, rhs)
            }
        }

        impl<'a, R: IntoExpr<'a>> std::ops::$trait<R> for &'a Var {
            type Output = Expr<'a>;

            #[track_caller]
            fn $method(self, rhs: R) -> Expr<'a> {
                binary(BinaryFn::$op, self, rhs)
            }
        }

        impl<'a> std::ops::$trait<Expr<'a>> for f64 {
            type Output = Expr<'a>;

            #[track_caller]
            fn $method(self, rhs: Expr<'a>) -> Expr<'a> {
                binary(BinaryFn::$op, self, rhs)
            }
        }

        impl<'a> std::ops::$trait<VarView<'a>> for f64 {
            type Output = Expr<'a>;

            #[track_caller]
            fn $method(self, rhs: VarView<'a>) -> Expr<'a> {
                binary(BinaryFn::$op, self, rhs)
            }
        }

        impl<'a> std::ops::$trait<&'a Var> for f64 {
            type Output = Expr<'a>;

            #[track_caller]
            fn $method(self, rhs: &'a Var) -> Expr<'a> {
                binary(BinaryFn::$op, self, rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, Add);
impl_binary_operator!(Sub, sub, Sub);
impl_binary_operator!(Mul, mul, Mul);
impl_binary_operator!(Div, div, Div);

impl<'a> std::ops::Neg for Expr<'a> {
    type Output = Expr<'a>;

    fn neg(self) -> Expr<'a> {
        unary(UnaryFn::Neg, self)
    }
}

impl<'a> std::ops::Neg for VarView<'a> {
    type Output = Expr<'a>;

    fn neg(self) -> Expr<'a> {
        unary(UnaryFn::Neg, self)
    }
}

impl<'a> std::ops::Neg for &'a Var {
    type Output = Expr<'a>;

    fn neg(self) -> Expr<'a> {
        unary(UnaryFn::Neg, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_fold() {
        let e = constant(2.0) * 3.0 + constant_vector(vec![1.0, 2.0]);
        let c = e.as_constant().unwrap();
        assert_eq!(c.values(), &[7.0, 8.0]);
        assert_eq!(e.shape(), Shape::Vector(2));

        assert_eq!(sum(constant_vector(vec![1.0, 2.0, 3.0])).as_constant().unwrap().values(), &[6.0]);
        assert_eq!(prod(constant_vector(vec![2.0, 3.0])).as_constant().unwrap().values(), &[6.0]);
        assert_eq!(pow::<3>(constant(2.0)).as_constant().unwrap().values(), &[8.0]);
        assert_eq!(exp(constant(0.0)).as_constant().unwrap().values(), &[1.0]);
    }

    #[test]
    fn test_var_operands_build_nodes() {
        let x = Var::scalar(1.0);
        let y = Var::vector(vec![1.0, 2.0]);
        assert_eq!((&x + 1.0).kind(), "add");
        assert_eq!((2.0 * &y).shape(), Shape::Vector(2));
        assert_eq!((-&x).kind(), "neg");
        assert_eq!(sin(x.view()).kind(), "sin");
        assert_eq!(x.view().into_expr().less_than(2.0).kind(), "lt");
    }

    #[test]
    fn test_fallible_builders() {
        let m = Var::matrix(2, 3, vec![0.0; 6]).unwrap();
        let v = Var::vector(vec![0.0; 2]);
        assert!(matches!(
            dot(&m, &v),
            Err(AdError::InnerDimensionMismatch {
                left_cols: 3,
                right_rows: 2
            })
        ));
        assert!(matches!(log_det(&m, LogDetMethod::default()), Err(AdError::NotSquareMatrix { .. })));
        assert!(matches!(if_else(&v, 1.0, 2.0), Err(AdError::NotScalar { .. })));
        assert!(for_each(Vec::<f64>::new(), constant).is_err());
        assert!(v.assign(constant(1.0)).is_err());
        assert!(v.add_eq(constant(1.0)).is_ok());
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn test_operator_panics_on_mismatch() {
        let a = Var::vector(vec![1.0, 2.0]);
        let b = Var::vector(vec![1.0, 2.0, 3.0]);
        let _ = &a + &b;
    }

    #[test]
    fn test_empty_reductions() {
        let s = sum_iter(Vec::<f64>::new(), constant).unwrap();
        assert_eq!(s.shape(), Shape::Scalar);
        let p = prod_iter(Vec::<f64>::new(), constant).unwrap();
        assert_eq!(p.kind(), "prod_iter");
        assert_eq!(p.shape(), Shape::Scalar);
    }
}
