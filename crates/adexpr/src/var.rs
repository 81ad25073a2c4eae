//! Leaf variables.
//!
//! A [`Var`] owns its value and adjoint storage. A [`VarView`] only views
//! storage owned elsewhere (a `Var`, or caller cells built with
//! [`cells`](crate::value::cells)). Views are `Copy`, and every copy aliases
//! the same numbers, which is what placeholders and compound assignment
//! rely on.
//!
//! # Example
//!
//! ```ignore
//! use adexpr::{Var, Workspace, autodiff, sin};
//!
//! let x = Var::scalar(0.5);
//! let mut expr = sin(&x) * &x;
//! let ws = Workspace::for_expr(&expr);
//! ws.bind(&mut expr)?;
//! let value = autodiff(&mut expr)?;
//! let dx = x.adj();
//! ```

use std::cell::Cell;
use std::fmt;

use crate::error::AdError;
use crate::shape::Shape;
use crate::value::ValueAdjView;

/// Owning leaf variable.
pub struct Var {
    value: Box<[Cell<f64>]>,
    adjoint: Box<[Cell<f64>]>,
    shape: Shape,
}

impl Var {
    /// Zero-initialized variable of any shape.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.size();
        Self {
            value: (0..n).map(|_| Cell::new(0.0)).collect(),
            adjoint: (0..n).map(|_| Cell::new(0.0)).collect(),
            shape,
        }
    }

    /// Scalar variable.
    pub fn scalar(value: f64) -> Self {
        let var = Self::zeros(Shape::Scalar);
        var.set(value);
        var
    }

    /// Column vector holding `values`.
    pub fn vector(values: Vec<f64>) -> Self {
        let n = values.len();
        Self {
            value: values.into_iter().map(Cell::new).collect(),
            adjoint: (0..n).map(|_| Cell::new(0.0)).collect(),
            shape: Shape::Vector(n),
        }
    }

    /// `rows x cols` matrix from column-major data.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] if `data.len() != rows * cols`.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, AdError> {
        Self::with_shape(Shape::Matrix(rows, cols), data)
    }

    /// Symmetric `n x n` matrix from column-major data.
    ///
    /// Only the lower triangle is read during evaluation; the upper
    /// triangle is overwritten from it.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] if `data.len() != n * n`.
    pub fn self_adjoint(n: usize, data: Vec<f64>) -> Result<Self, AdError> {
        Self::with_shape(Shape::SelfAdjoint(n), data)
    }

    /// Variable of the given shape from column-major data.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] if the data length does not match.
    pub fn with_shape(shape: Shape, data: Vec<f64>) -> Result<Self, AdError> {
        if data.len() != shape.size() {
            return Err(AdError::SizeMismatch {
                expected: shape.size(),
                actual: data.len(),
            });
        }
        let var = Self::zeros(shape);
        for (cell, v) in var.value.iter().zip(data) {
            cell.set(v);
        }
        Ok(var)
    }

    /// View of this variable usable inside expressions.
    pub fn view(&self) -> VarView<'_> {
        VarView {
            view: self.value_adj_view(),
        }
    }

    fn value_adj_view(&self) -> ValueAdjView<'_> {
        ValueAdjView::from_parts(&self.value, &self.adjoint, self.shape)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    /// Scalar value (first element for arrays).
    pub fn get(&self) -> f64 {
        self.value[0].get()
    }

    /// Set the scalar value (first element for arrays).
    pub fn set(&self, value: f64) {
        self.value[0].set(value);
    }

    /// Element `(i, j)`.
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.value[i + j * self.shape.rows()].get()
    }

    /// Overwrite every value.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] if `values` has the wrong length.
    pub fn set_values(&self, values: &[f64]) -> Result<(), AdError> {
        if values.len() != self.size() {
            return Err(AdError::SizeMismatch {
                expected: self.size(),
                actual: values.len(),
            });
        }
        for (cell, &v) in self.value.iter().zip(values) {
            cell.set(v);
        }
        Ok(())
    }

    pub fn values(&self) -> Vec<f64> {
        self.value.iter().map(Cell::get).collect()
    }

    /// Scalar adjoint (first element for arrays).
    pub fn adj(&self) -> f64 {
        self.adjoint[0].get()
    }

    /// Adjoint of element `(i, j)`.
    pub fn adj_at(&self, i: usize, j: usize) -> f64 {
        self.adjoint[i + j * self.shape.rows()].get()
    }

    pub fn adjoints(&self) -> Vec<f64> {
        self.adjoint.iter().map(Cell::get).collect()
    }

    /// Zero the accumulated adjoint before a fresh backward pass.
    pub fn reset_adj(&self) {
        for cell in self.adjoint.iter() {
            cell.set(0.0);
        }
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("shape", &self.shape)
            .field("values", &self.values())
            .field("adjoints", &self.adjoints())
            .finish()
    }
}

/// Non-owning leaf over existing value/adjoint storage.
#[derive(Clone, Copy, Debug)]
pub struct VarView<'a> {
    view: ValueAdjView<'a>,
}

impl<'a> VarView<'a> {
    /// View caller-owned cells as a leaf of the given shape.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] if either buffer has the wrong
    /// length, or the adjoint buffer is empty.
    pub fn new(
        value: &'a [Cell<f64>],
        adjoint: &'a [Cell<f64>],
        shape: Shape,
    ) -> Result<Self, AdError> {
        if adjoint.len() != shape.size() {
            return Err(AdError::SizeMismatch {
                expected: shape.size(),
                actual: adjoint.len(),
            });
        }
        Ok(Self {
            view: ValueAdjView::new(value, adjoint, shape)?,
        })
    }

    pub fn shape(&self) -> Shape {
        self.view.shape()
    }

    pub fn size(&self) -> usize {
        self.view.size()
    }

    /// The underlying value/adjoint view.
    pub fn value_adj_view(&self) -> ValueAdjView<'a> {
        self.view
    }

    pub fn get(&self) -> f64 {
        self.view.scalar()
    }

    pub fn set(&self, value: f64) {
        self.view.set_val(0, value);
    }

    pub fn values(&self) -> Vec<f64> {
        self.view.values()
    }

    pub fn adj(&self) -> f64 {
        self.view.adj(0)
    }

    pub fn adjoints(&self) -> Vec<f64> {
        self.view.adjoints()
    }

    pub fn reset_adj(&self) {
        self.view.reset_adj();
    }

    /// Symmetrize self-adjoint storage from its lower triangle.
    pub(crate) fn symmetrize(&self) -> ValueAdjView<'a> {
        if let Shape::SelfAdjoint(n) = self.shape() {
            for j in 0..n {
                for i in 0..j {
                    self.view.set_val(i + j * n, self.view.get(j, i));
                }
            }
        }
        self.view
    }

    /// Accumulate `seed` into the adjoint.
    ///
    /// Self-adjoint leaves fold contributions onto the lower triangle.
    pub(crate) fn accumulate(&self, seed: &[f64]) {
        match self.shape() {
            Shape::SelfAdjoint(n) => {
                for j in 0..n {
                    for i in 0..n {
                        let s = seed[i + j * n];
                        if i >= j {
                            self.view.add_adj(i + j * n, s);
                        } else {
                            self.view.add_adj(j + i * n, s);
                        }
                    }
                }
            }
            _ => {
                for (k, &s) in seed.iter().enumerate() {
                    self.view.add_adj(k, s);
                }
            }
        }
    }
}

impl<'a> From<&'a Var> for VarView<'a> {
    fn from(var: &'a Var) -> Self {
        var.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::cells;

    #[test]
    fn test_var_constructors() {
        let x = Var::scalar(3.0);
        assert_eq!(x.shape(), Shape::Scalar);
        assert_eq!(x.get(), 3.0);
        assert_eq!(x.adj(), 0.0);

        let v = Var::vector(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.shape(), Shape::Vector(3));
        assert_eq!(v.values(), vec![1.0, 2.0, 3.0]);

        let m = Var::matrix(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.at(1, 0), 2.0);
        assert_eq!(m.at(0, 1), 3.0);
        assert!(Var::matrix(2, 2, vec![1.0]).is_err());
    }

    #[test]
    fn test_view_aliases_var() {
        let x = Var::vector(vec![1.0, 2.0]);
        let a = x.view();
        let b = x.view();
        a.accumulate(&[1.0, 2.0]);
        b.accumulate(&[0.5, 0.5]);
        assert_eq!(x.adjoints(), vec![1.5, 2.5]);
        x.reset_adj();
        assert_eq!(a.adjoints(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_view_over_caller_storage() {
        let mut val = [4.0, 5.0];
        let mut adj = [0.0, 0.0];
        let val = cells(&mut val);
        let adj = cells(&mut adj);
        let w = VarView::new(val, adj, Shape::Vector(2)).unwrap();
        w.accumulate(&[1.0, -1.0]);
        assert_eq!(adj[0].get(), 1.0);
        assert_eq!(adj[1].get(), -1.0);
        assert_eq!(w.symmetrize().values(), vec![4.0, 5.0]);
        assert!(VarView::new(val, &adj[..1], Shape::Vector(2)).is_err());
    }

    #[test]
    fn test_self_adjoint_symmetrizes_and_folds() {
        // column-major, lower triangle holds [1, 2; 2, 3], upper garbage
        let s = Var::self_adjoint(2, vec![1.0, 2.0, 99.0, 3.0]).unwrap();
        let view = s.view();
        let v = view.symmetrize();
        assert_eq!(v.get(0, 1), 2.0);
        assert_eq!(v.get(1, 0), 2.0);

        view.accumulate(&[1.0, 2.0, 3.0, 4.0]);
        // (0,1) seed folds onto (1,0)
        assert_eq!(s.adjoints(), vec![1.0, 5.0, 0.0, 4.0]);
    }
}
