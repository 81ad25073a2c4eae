use crate::error::AdError;
use crate::expr::{Expr, ExprNode, uniform_seed};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Check that every term has the same (dense) shape and return it.
pub(crate) fn common_shape(terms: &[Expr<'_>]) -> Result<Shape, AdError> {
    let Some(first) = terms.first() else {
        return Ok(Shape::Scalar);
    };
    let shape = first.shape().dense();
    for term in &terms[1..] {
        if term.shape().dense() != shape {
            return Err(AdError::ShapeMismatch {
                left: shape,
                right: term.shape(),
            });
        }
    }
    Ok(shape)
}

/// Sum of a sequence of same-shaped expressions. Empty sums are `0`.
pub struct SumIterNode<'a> {
    terms: Vec<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> SumIterNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if the terms differ in shape.
    pub fn new(terms: Vec<Expr<'a>>) -> Result<Self, AdError> {
        let shape = common_shape(&terms)?;
        Ok(Self {
            terms,
            view: ValueAdjView::unbound(shape),
        })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<'a> ExprNode<'a> for SumIterNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        self.view.fill_val(0.0);
        for term in &mut self.terms {
            let v = term.feval();
            for k in 0..self.view.size() {
                self.view.set_val(k, self.view.val(k) + v.val(k));
            }
        }
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        self.view.set_adj_from(seed);
        for term in self.terms.iter_mut().rev() {
            term.beval(seed);
        }
    }

    fn bind_cache_size(&self) -> SizePack {
        self.terms
            .iter()
            .fold(self.single_bind_cache_size(), |acc, t| acc + t.bind_cache_size())
    }

    fn single_bind_cache_size(&self) -> SizePack {
        let n = self.view.size();
        SizePack::new(n, n)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self
            .terms
            .iter_mut()
            .fold(cursor, |cursor, t| t.bind_cache(cursor));
        let (view, cursor) = cursor.take(self.shape(), self.single_bind_cache_size());
        self.view = view;
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.view
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.view = view.reshaped(self.shape());
    }
}

/// Sum of all elements of one expression.
pub struct SumElemNode<'a> {
    expr: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> SumElemNode<'a> {
    pub fn new(expr: Expr<'a>) -> Self {
        Self {
            expr: Box::new(expr),
            view: ValueAdjView::unbound(Shape::Scalar),
        }
    }
}

impl<'a> ExprNode<'a> for SumElemNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let total = self.expr.feval().sum();
        self.view.set_val(0, total);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let n = self.expr.shape().size();
        self.expr.beval(&uniform_seed(n, seed[0]));
    }

    fn bind_cache_size(&self) -> SizePack {
        self.expr.bind_cache_size() + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(1, 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.expr.bind_cache(cursor);
        let (view, cursor) = cursor.take(Shape::Scalar, self.single_bind_cache_size());
        self.view = view;
        cursor
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.view
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.view = view.reshaped(Shape::Scalar);
    }
}
