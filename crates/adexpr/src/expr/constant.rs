use crate::error::AdError;
use crate::expr::ExprNode;
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// A value with no adjoint.
///
/// Constants claim a value-only slot and write their data into it on bind
/// and on every forward pass, so an aliased slot is refreshed too.
pub struct Constant<'a> {
    data: Vec<f64>,
    shape: Shape,
    view: ValueAdjView<'a>,
}

impl<'a> Constant<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::SizeMismatch`] if `data` does not fill `shape`.
    pub fn new(data: Vec<f64>, shape: Shape) -> Result<Self, AdError> {
        if data.len() != shape.size() {
            return Err(AdError::SizeMismatch {
                expected: shape.size(),
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape,
            view: ValueAdjView::unbound(shape),
        })
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            data: vec![value],
            shape: Shape::Scalar,
            view: ValueAdjView::unbound(Shape::Scalar),
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Element `k`, broadcasting scalar constants.
    pub(crate) fn bval(&self, k: usize) -> f64 {
        if self.data.len() == 1 {
            self.data[0]
        } else {
            self.data[k]
        }
    }

    /// Elementwise map into a new constant of `shape`.
    pub(crate) fn from_fn(shape: Shape, f: impl Fn(usize) -> f64) -> Self {
        Self {
            data: (0..shape.size()).map(f).collect(),
            shape,
            view: ValueAdjView::unbound(shape),
        }
    }
}

impl<'a> ExprNode<'a> for Constant<'a> {
    fn shape(&self) -> Shape {
        self.shape
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        self.view.copy_from(&self.data);
        self.view
    }

    fn beval(&mut self, _seed: &[f64]) {}

    fn bind_cache_size(&self) -> SizePack {
        self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(self.shape.size(), 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let (view, cursor) = cursor.take(self.shape, self.single_bind_cache_size());
        view.copy_from(&self.data);
        self.view = view;
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.view
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.view = view.reshaped(self.shape);
        self.view.copy_from(&self.data);
    }
}
