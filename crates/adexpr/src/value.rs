//! Arena storage for node values and adjoints.
//!
//! Binding is a two-phase protocol:
//!
//! ```text
//! 1. expr.bind_cache_size()          -> SizePack { val, adj }
//! 2. Workspace::new(size)            -> two flat cell buffers
//! 3. expr.bind_cache(ws.cursor())    -> every node claims its slot(s)
//! ```
//!
//! A [`Cursor`] hands out [`ValueAdjView`]s by offset. Views are plain
//! index ranges into the arena, so several nodes may share one slot
//! (placeholders) without any pointer surgery.

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use crate::error::AdError;
use crate::shape::Shape;

/// Number of value cells and adjoint cells a node needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SizePack {
    pub val: usize,
    pub adj: usize,
}

impl SizePack {
    pub const fn new(val: usize, adj: usize) -> Self {
        Self { val, adj }
    }

    pub const fn zero() -> Self {
        Self { val: 0, adj: 0 }
    }

    /// True when `self` fits inside `other` in both components.
    pub fn fits_in(&self, other: SizePack) -> bool {
        self.val <= other.val && self.adj <= other.adj
    }
}

impl Add for SizePack {
    type Output = SizePack;

    fn add(self, rhs: SizePack) -> SizePack {
        SizePack::new(self.val + rhs.val, self.adj + rhs.adj)
    }
}

impl AddAssign for SizePack {
    fn add_assign(&mut self, rhs: SizePack) {
        self.val += rhs.val;
        self.adj += rhs.adj;
    }
}

impl Sub for SizePack {
    type Output = SizePack;

    fn sub(self, rhs: SizePack) -> SizePack {
        SizePack::new(self.val - rhs.val, self.adj - rhs.adj)
    }
}

impl fmt::Display for SizePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} values / {} adjoints", self.val, self.adj)
    }
}

/// Reinterpret a mutable slice as shareable cells.
///
/// Useful for building [`VarView`](crate::var::VarView)s over caller-owned
/// storage.
pub fn cells(data: &mut [f64]) -> &[Cell<f64>] {
    Cell::from_mut(data).as_slice_of_cells()
}

/// Non-owning view of one node's value (and optionally adjoint) region.
///
/// The view is `Copy`; copies alias the same cells.
#[derive(Clone, Copy)]
pub struct ValueAdjView<'a> {
    val: &'a [Cell<f64>],
    adj: &'a [Cell<f64>],
    shape: Shape,
}

impl<'a> ValueAdjView<'a> {
    /// Build a view over existing cells.
    ///
    /// `adj` may be empty for value-only views.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] when either region has the wrong
    /// length for `shape`.
    pub fn new(
        val: &'a [Cell<f64>],
        adj: &'a [Cell<f64>],
        shape: Shape,
    ) -> Result<Self, AdError> {
        let expected = shape.size();
        if val.len() != expected {
            return Err(AdError::SizeMismatch {
                expected,
                actual: val.len(),
            });
        }
        if !adj.is_empty() && adj.len() != expected {
            return Err(AdError::SizeMismatch {
                expected,
                actual: adj.len(),
            });
        }
        Ok(Self { val, adj, shape })
    }

    /// Unchecked constructor for storage whose lengths are fixed by
    /// construction.
    pub(crate) fn from_parts(val: &'a [Cell<f64>], adj: &'a [Cell<f64>], shape: Shape) -> Self {
        Self { val, adj, shape }
    }

    /// An unbound view. Reading from it panics.
    pub fn unbound(shape: Shape) -> Self {
        Self {
            val: Default::default(),
            adj: Default::default(),
            shape,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    pub fn is_bound(&self) -> bool {
        self.val.len() == self.shape.size()
    }

    /// Whether this view owns an adjoint region.
    pub fn has_adjoint(&self) -> bool {
        !self.adj.is_empty()
    }

    /// Value at linear (column-major) index `k`.
    #[inline]
    pub fn val(&self, k: usize) -> f64 {
        self.val[k].get()
    }

    /// Value of a scalar view.
    #[inline]
    pub fn scalar(&self) -> f64 {
        self.val(0)
    }

    /// Value at `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.val(i + j * self.rows())
    }

    #[inline]
    pub fn set_val(&self, k: usize, v: f64) {
        self.val[k].set(v);
    }

    /// Value of element `k`, broadcasting scalar views.
    #[inline]
    pub(crate) fn bval(&self, k: usize) -> f64 {
        if self.val.len() == 1 {
            self.val(0)
        } else {
            self.val(k)
        }
    }

    #[inline]
    pub fn adj(&self, k: usize) -> f64 {
        self.adj[k].get()
    }

    #[inline]
    pub fn get_adj(&self, i: usize, j: usize) -> f64 {
        self.adj(i + j * self.rows())
    }

    #[inline]
    pub fn set_adj(&self, k: usize, v: f64) {
        self.adj[k].set(v);
    }

    #[inline]
    pub fn add_adj(&self, k: usize, v: f64) {
        let cell = &self.adj[k];
        cell.set(cell.get() + v);
    }

    /// Overwrite the whole value region.
    pub fn copy_from(&self, values: &[f64]) {
        for (cell, &v) in self.val.iter().zip(values) {
            cell.set(v);
        }
    }

    /// Overwrite the whole adjoint region. No-op on value-only views.
    pub fn set_adj_from(&self, seed: &[f64]) {
        for (cell, &s) in self.adj.iter().zip(seed) {
            cell.set(s);
        }
    }

    /// Copy every value out of another view with the same size.
    pub fn copy_values_of(&self, other: &ValueAdjView<'_>) {
        for (dst, src) in self.val.iter().zip(other.val) {
            dst.set(src.get());
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.val.iter().map(Cell::get).collect()
    }

    pub fn adjoints(&self) -> Vec<f64> {
        self.adj.iter().map(Cell::get).collect()
    }

    pub fn fill_val(&self, v: f64) {
        for cell in self.val {
            cell.set(v);
        }
    }

    pub fn reset_adj(&self) {
        for cell in self.adj {
            cell.set(0.0);
        }
    }

    /// Sum of every value.
    pub fn sum(&self) -> f64 {
        self.val.iter().map(Cell::get).sum()
    }

    /// Same value storage as `other`.
    pub fn shares_values_with(&self, other: &ValueAdjView<'_>) -> bool {
        std::ptr::eq(self.val.as_ptr(), other.val.as_ptr()) && self.val.len() == other.val.len()
    }

    /// Same view with a different shape of equal size.
    pub(crate) fn reshaped(self, shape: Shape) -> Self {
        debug_assert_eq!(shape.size(), self.shape.size());
        Self { shape, ..self }
    }
}

impl fmt::Debug for ValueAdjView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAdjView")
            .field("shape", &self.shape)
            .field("values", &self.values())
            .field("adjoints", &self.adjoints())
            .finish()
    }
}

/// Position inside a [`Workspace`] during the bind pass.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    values: &'a [Cell<f64>],
    adjoints: &'a [Cell<f64>],
    offset: SizePack,
}

impl<'a> Cursor<'a> {
    /// Cursor over arbitrary cell buffers, starting at offset zero.
    pub fn new(values: &'a [Cell<f64>], adjoints: &'a [Cell<f64>]) -> Self {
        Self {
            values,
            adjoints,
            offset: SizePack::zero(),
        }
    }

    /// Current offset from the start of the buffers.
    pub fn offset(&self) -> SizePack {
        self.offset
    }

    /// Cells still available after the current offset.
    pub fn remaining(&self) -> SizePack {
        SizePack::new(
            self.values.len() - self.offset.val,
            self.adjoints.len() - self.offset.adj,
        )
    }

    /// Claim `size` cells and view them with `shape`.
    ///
    /// # Panics
    ///
    /// Panics if the buffers are exhausted. [`Workspace::bind`] checks the
    /// total size up front.
    pub fn take(self, shape: Shape, size: SizePack) -> (ValueAdjView<'a>, Cursor<'a>) {
        let SizePack { val, adj } = self.offset;
        let view = ValueAdjView {
            val: &self.values[val..val + size.val],
            adj: &self.adjoints[adj..adj + size.adj],
            shape,
        };
        let next = Cursor {
            offset: self.offset + size,
            ..self
        };
        (view, next)
    }

    /// Give back the most recently claimed `size` cells.
    pub fn rewind(self, size: SizePack) -> Cursor<'a> {
        Cursor {
            offset: self.offset - size,
            ..self
        }
    }
}

/// Owner of the flat value and adjoint buffers an expression binds into.
pub struct Workspace {
    values: Box<[Cell<f64>]>,
    adjoints: Box<[Cell<f64>]>,
}

impl Workspace {
    /// Allocate zeroed buffers of the given size.
    pub fn new(size: SizePack) -> Self {
        Self {
            values: (0..size.val).map(|_| Cell::new(0.0)).collect(),
            adjoints: (0..size.adj).map(|_| Cell::new(0.0)).collect(),
        }
    }

    pub fn size(&self) -> SizePack {
        SizePack::new(self.values.len(), self.adjoints.len())
    }

    /// Cursor at the start of the buffers.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.values, &self.adjoints)
    }

    /// Zero every intermediate adjoint.
    pub fn reset_adj(&self) {
        for cell in self.adjoints.iter() {
            cell.set(0.0);
        }
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace").field("size", &self.size()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_pack_arithmetic() {
        let a = SizePack::new(3, 2);
        let b = SizePack::new(1, 1);
        assert_eq!(a + b, SizePack::new(4, 3));
        assert_eq!(a - b, SizePack::new(2, 1));
        assert!(b.fits_in(a));
        assert!(!a.fits_in(b));
        let mut c = SizePack::zero();
        c += a;
        assert_eq!(c, a);
    }

    #[test]
    fn test_cursor_take_and_rewind() {
        let ws = Workspace::new(SizePack::new(5, 3));
        let cursor = ws.cursor();
        let (v1, cursor) = cursor.take(Shape::Vector(2), SizePack::new(2, 2));
        let (v2, cursor) = cursor.take(Shape::Scalar, SizePack::new(1, 0));
        assert_eq!(cursor.offset(), SizePack::new(3, 2));
        assert_eq!(cursor.remaining(), SizePack::new(2, 1));
        assert!(v1.has_adjoint());
        assert!(!v2.has_adjoint());

        let cursor = cursor.rewind(SizePack::new(1, 0));
        let (v3, _) = cursor.take(Shape::Scalar, SizePack::new(1, 0));
        assert!(v3.shares_values_with(&v2));
    }

    #[test]
    fn test_view_access_column_major() {
        let mut data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut adj = [0.0; 6];
        let view = ValueAdjView::new(cells(&mut data), cells(&mut adj), Shape::Matrix(2, 3)).unwrap();
        assert_eq!(view.get(0, 0), 1.0);
        assert_eq!(view.get(1, 0), 2.0);
        assert_eq!(view.get(0, 2), 5.0);
        view.add_adj(3, 2.5);
        view.add_adj(3, 1.0);
        assert_eq!(view.get_adj(1, 1), 3.5);
        assert_eq!(view.sum(), 21.0);
        view.reset_adj();
        assert_eq!(view.adjoints(), vec![0.0; 6]);
    }

    #[test]
    fn test_view_rejects_wrong_length() {
        let mut data = [1.0, 2.0];
        let err = ValueAdjView::new(cells(&mut data), &[], Shape::Vector(3));
        assert!(matches!(
            err,
            Err(AdError::SizeMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_views_alias() {
        let ws = Workspace::new(SizePack::new(2, 2));
        let (a, _) = ws.cursor().take(Shape::Vector(2), SizePack::new(2, 2));
        let (b, _) = ws.cursor().take(Shape::Vector(2), SizePack::new(2, 2));
        a.set_val(1, 7.0);
        b.add_adj(0, 1.5);
        assert_eq!(b.val(1), 7.0);
        assert_eq!(a.adj(0), 1.5);
        ws.reset_adj();
        assert_eq!(a.adj(0), 0.0);
    }
}
