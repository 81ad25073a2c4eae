//! Linear-algebra backend.
//!
//! Dense products and factorizations are delegated to faer. The
//! `faer_interop` module copies between arena views and faer matrices;
//! `decomposition` wraps the factorizations the matrix nodes need.

mod decomposition;
mod faer_interop;

pub use decomposition::{Factorization, LogDetMethod};
pub use faer_interop::{mat_from_seed, mat_from_view, vec_from_mat, write_values};
