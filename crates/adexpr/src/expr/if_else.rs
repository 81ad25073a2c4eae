use crate::error::AdError;
use crate::expr::{Expr, ExprNode};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// `if cond != 0 { then } else { otherwise }`.
///
/// Only the selected branch is evaluated, and only it receives a seed.
/// The condition is never differentiated.
pub struct IfElseNode<'a> {
    cond: Box<Expr<'a>>,
    then: Box<Expr<'a>>,
    otherwise: Box<Expr<'a>>,
    took_then: bool,
    view: ValueAdjView<'a>,
}

impl<'a> IfElseNode<'a> {
    /// # Errors
    ///
    /// - [`AdError::NotScalar`] if the condition is not a scalar.
    /// - [`AdError::ShapeMismatch`] if the branches differ in shape.
    pub fn new(cond: Expr<'a>, then: Expr<'a>, otherwise: Expr<'a>) -> Result<Self, AdError> {
        if !cond.shape().is_scalar() {
            return Err(AdError::NotScalar {
                shape: cond.shape(),
            });
        }
        let shape = then.shape().dense();
        if otherwise.shape().dense() != shape {
            return Err(AdError::ShapeMismatch {
                left: then.shape(),
                right: otherwise.shape(),
            });
        }
        Ok(Self {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
            took_then: true,
            view: ValueAdjView::unbound(shape),
        })
    }

    /// The selected branch when all three parts are constants.
    pub(crate) fn fold(self) -> Result<Expr<'a>, Self> {
        let cond = match self.cond.as_constant() {
            Some(c) if self.then.is_constant() && self.otherwise.is_constant() => c.bval(0),
            _ => return Err(self),
        };
        Ok(if cond != 0.0 { *self.then } else { *self.otherwise })
    }
}

impl<'a> ExprNode<'a> for IfElseNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        self.took_then = self.cond.feval().scalar() != 0.0;
        let value = if self.took_then {
            self.then.feval()
        } else {
            self.otherwise.feval()
        };
        self.view.copy_values_of(&value);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        if self.took_then {
            self.then.beval(seed);
        } else {
            self.otherwise.beval(seed);
        }
    }

    fn bind_cache_size(&self) -> SizePack {
        self.cond.bind_cache_size()
            + self.then.bind_cache_size()
            + self.otherwise.bind_cache_size()
            + self.single_bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        SizePack::new(self.view.size(), 0)
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.cond.bind_cache(cursor);
        let cursor = self.then.bind_cache(cursor);
        let cursor = self.otherwise.bind_cache(cursor);
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
