//! Conversion between arena views and faer matrices.
//!
//! # Memory Layout
//!
//! Arena views and faer both use column-major order, so element `(i, j)`
//! maps to linear index `i + j * rows` on both sides. Arena cells are
//! interior-mutable, so values are copied rather than viewed in place.

use faer::{Mat, MatRef};

use crate::value::ValueAdjView;

/// Copy a view's values into an owned faer matrix.
///
/// Vectors become `n x 1` matrices and scalars `1 x 1`.
///
/// # Example
///
/// ```ignore
/// let m = mat_from_view(&view);
/// assert_eq!(m.nrows(), view.rows());
/// ```
pub fn mat_from_view(view: &ValueAdjView<'_>) -> Mat<f64> {
    Mat::from_fn(view.rows(), view.cols(), |i, j| view.get(i, j))
}

/// View a seed slice as a column-major matrix (zero-copy).
///
/// # Panics
///
/// Panics if `rows * cols != seed.len()`.
pub fn mat_from_seed(seed: &[f64], rows: usize, cols: usize) -> MatRef<'_, f64> {
    assert_eq!(
        rows * cols,
        seed.len(),
        "Matrix dimensions ({} x {} = {}) must match seed length ({})",
        rows,
        cols,
        rows * cols,
        seed.len()
    );
    MatRef::from_column_major_slice(seed, rows, cols)
}

/// Write a matrix into a view's value region.
pub fn write_values(view: &ValueAdjView<'_>, mat: MatRef<'_, f64>) {
    let rows = mat.nrows();
    for j in 0..mat.ncols() {
        for i in 0..rows {
            view.set_val(i + j * rows, mat[(i, j)]);
        }
    }
}

/// Copy a matrix out in column-major order.
pub fn vec_from_mat(mat: MatRef<'_, f64>) -> Vec<f64> {
    let rows = mat.nrows();
    let cols = mat.ncols();
    let mut data = Vec::with_capacity(rows * cols);
    for j in 0..cols {
        for i in 0..rows {
            data.push(mat[(i, j)]);
        }
    }
    data
}
