//! Forward-mode differentiation.
//!
//! [`Dual`] numbers reuse the operator functors of the reverse-mode
//! nodes. Nested duals give second derivatives, which [`hessian`] and
//! [`hvp`] use for dense Hessians and Hessian-vector products.

mod dual;
mod hessian;

pub use dual::Dual;
pub use hessian::{gradient, hessian, hvp};
