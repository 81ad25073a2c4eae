//! adexpr - reverse-mode automatic differentiation over arena-bound
//! expression graphs.
//!
//! Expressions over scalar, vector and matrix variables are built with
//! ordinary operators and free functions. Before evaluation an expression
//! is bound to a [`Workspace`]: every intermediate value and adjoint gets a
//! slot in one flat buffer, so evaluation allocates nothing per node.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Graph construction (expr, stat modules)
//!     → operators, sum/prod/dot/log_det, log-density factories
//!
//! Level 2: Binding and evaluation (eval module)
//!     → Workspace::bind, evaluate, autodiff, expr_hessian
//!
//! Level 3: Numeric backend (ops, backend modules)
//!     → operator functors, faer products and factorizations
//! ```
//!
//! # Example
//!
//! ```
//! use adexpr::{Var, Workspace, autodiff, sin, sum};
//!
//! let x = Var::vector(vec![0.5, 1.0, 1.5]);
//! let mut expr = sum(sin(&x) * &x);
//! let ws = Workspace::for_expr(&expr);
//! ws.bind(&mut expr).unwrap();
//!
//! let value = autodiff(&mut expr).unwrap();
//! assert!(value > 0.0);
//!
//! // d/dx (x sin x) = sin x + x cos x
//! let expected = 0.5_f64.sin() + 0.5 * 0.5_f64.cos();
//! assert!((x.adjoints()[0] - expected).abs() < 1e-12);
//! ```

pub mod backend;
pub mod error;
pub mod eval;
pub mod expr;
#[cfg(feature = "forward")]
pub mod forward;
pub mod ops;
pub mod scalar;
pub mod shape;
pub mod stat;
pub mod value;
pub mod var;

pub use backend::LogDetMethod;
pub use error::AdError;
pub use eval::{
    autodiff, autodiff_with_seed, bind_cache_size, evaluate, evaluate_adj, expr_hessian,
};
pub use expr::{
    Constant, Expr, ExprNode, IntoExpr, acos, asin, atan, constant, constant_matrix,
    constant_vector, cos, cosh, det, dot, erf, exp, for_each, glue, if_else, log, log_det,
    norm, pow, prod, prod_iter, sigmoid, sin, sinh, sqrt, sum, sum_iter, tan, tanh, transpose,
};
#[cfg(feature = "forward")]
pub use forward::{Dual, gradient, hessian, hvp};
pub use scalar::Scalar;
pub use shape::Shape;
pub use stat::{
    bernoulli_adj_log_pdf, cauchy_adj_log_pdf, normal_adj_log_pdf, uniform_adj_log_pdf,
    wishart_adj_log_pdf,
};
pub use value::{Cursor, SizePack, ValueAdjView, Workspace, cells};
pub use var::{Var, VarView};
