//! Value shapes and broadcasting rules.
//!
//! Every expression node carries a [`Shape`]. Vectors are column vectors
//! and matrices are stored column-major, so element `(i, j)` of an
//! `r x c` value lives at linear index `i + j * r`.

use std::fmt;

use crate::error::AdError;

/// Shape of a node's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A single number.
    Scalar,
    /// A column vector of the given length.
    Vector(usize),
    /// A dense `rows x cols` matrix.
    Matrix(usize, usize),
    /// A symmetric `n x n` matrix whose lower triangle is authoritative.
    SelfAdjoint(usize),
}

impl Shape {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        match *self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
            Shape::Matrix(r, _) => r,
            Shape::SelfAdjoint(n) => n,
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        match *self {
            Shape::Scalar | Shape::Vector(_) => 1,
            Shape::Matrix(_, c) => c,
            Shape::SelfAdjoint(n) => n,
        }
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Shape::Vector(_))
    }

    /// True for both dense and self-adjoint matrices.
    pub fn is_matrix(&self) -> bool {
        matches!(self, Shape::Matrix(..) | Shape::SelfAdjoint(_))
    }

    pub fn is_square(&self) -> bool {
        self.is_matrix() && self.rows() == self.cols()
    }

    /// Forget the self-adjoint tag.
    pub fn dense(self) -> Shape {
        match self {
            Shape::SelfAdjoint(n) => Shape::Matrix(n, n),
            other => other,
        }
    }

    /// Shape of the transposed value.
    pub fn transpose(self) -> Shape {
        match self {
            Shape::Scalar => Shape::Scalar,
            Shape::Vector(n) => Shape::Matrix(1, n),
            Shape::Matrix(r, c) => Shape::Matrix(c, r),
            Shape::SelfAdjoint(n) => Shape::SelfAdjoint(n),
        }
    }

    /// Result shape of an elementwise operation on `self` and `other`.
    ///
    /// Allowed combinations: either side scalar, two vectors of equal
    /// length, or two matrices of equal dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] for any other combination.
    pub fn broadcast(self, other: Shape) -> Result<Shape, AdError> {
        let mismatch = AdError::ShapeMismatch {
            left: self,
            right: other,
        };
        match (self, other) {
            (Shape::Scalar, rhs) => Ok(rhs.dense()),
            (lhs, Shape::Scalar) => Ok(lhs.dense()),
            (Shape::Vector(n), Shape::Vector(m)) if n == m => Ok(self),
            (lhs, rhs) if lhs.is_matrix() && rhs.is_matrix() => {
                if lhs.rows() == rhs.rows() && lhs.cols() == rhs.cols() {
                    Ok(Shape::Matrix(lhs.rows(), lhs.cols()))
                } else {
                    Err(mismatch)
                }
            }
            _ => Err(mismatch),
        }
    }

    /// Check that `other` is either scalar or has exactly `self.size()`
    /// elements laid out the same way. Used by reductions and log-densities
    /// whose parameters broadcast against the data.
    pub(crate) fn accepts_param(self, other: Shape) -> Result<(), AdError> {
        if other.is_scalar() || other.dense() == self.dense() {
            Ok(())
        } else {
            Err(AdError::ShapeMismatch {
                left: self,
                right: other,
            })
        }
    }

    /// # Errors
    ///
    /// Returns [`AdError::NotSquareMatrix`] unless `self` is a square matrix.
    pub(crate) fn require_square(self) -> Result<(), AdError> {
        if self.is_square() {
            Ok(())
        } else {
            Err(AdError::NotSquareMatrix {
                rows: self.rows(),
                cols: self.cols(),
            })
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Vector(n) => write!(f, "vector({n})"),
            Shape::Matrix(r, c) => write!(f, "matrix({r}x{c})"),
            Shape::SelfAdjoint(n) => write!(f, "self-adjoint({n}x{n})"),
        }
    }
}
