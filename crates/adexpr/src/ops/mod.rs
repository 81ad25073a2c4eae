//! Operator functors.
//!
//! Each mathematical operator is a stateless unit struct implementing
//! [`UnaryOp`] or [`BinaryOp`]. The maps are written against [`Scalar`], so
//! the same rules drive reverse-mode nodes (`T = f64`) and forward-mode
//! duals.
//!
//! `fmap` computes the value; `bmap` / `blmap` / `brmap` turn a seed into
//! the seed for an operand, given the operand values and the already
//! computed result `f`.
//!
//! Expression nodes store the operator as a [`UnaryFn`] or [`BinaryFn`]
//! tag, which dispatches to the functor structs.

mod binary;
mod unary;

pub use binary::{
    Add, BinaryFn, BinaryOp, Div, Equal, GreaterThan, GreaterThanEq, LessThan, LessThanEq,
    LogicalAnd, LogicalOr, Mul, NotEqual, Sub,
};
pub use unary::{
    Acos, Asin, Atan, Cos, Cosh, Erf, Exp, Log, Neg, Sigmoid, Sin, Sinh, Sqrt, Tan, Tanh,
    UnaryFn, UnaryOp,
};
