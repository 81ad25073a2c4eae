//! Error types for adexpr.

use thiserror::Error;

use crate::shape::Shape;
use crate::value::SizePack;

/// Errors reported while building, binding or driving an expression.
///
/// Numeric domain problems (log of a negative number, an invalid
/// distribution parameter) are never reported here. They surface as
/// infinities in the computed values.
#[derive(Debug, Error)]
pub enum AdError {
    /// Two operands cannot be broadcast against each other.
    #[error("shape mismatch: cannot combine {left} with {right}")]
    ShapeMismatch { left: Shape, right: Shape },

    /// Inner dimensions of a matrix product disagree.
    #[error("inner dimension mismatch: left has {left_cols} columns, right has {right_rows} rows")]
    InnerDimensionMismatch { left_cols: usize, right_rows: usize },

    /// Data length does not match the requested shape.
    #[error("size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Operation requires a square matrix.
    #[error("matrix must be square: got {rows}x{cols}")]
    NotSquareMatrix { rows: usize, cols: usize },

    /// Operation requires a scalar-valued expression.
    #[error("expected a scalar expression, got {shape}")]
    NotScalar { shape: Shape },

    /// Workspace buffers cannot hold the expression's intermediate values.
    #[error("workspace too small: need {needed}, have {available}")]
    WorkspaceTooSmall {
        needed: SizePack,
        available: SizePack,
    },

    /// Any other invalid request.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
