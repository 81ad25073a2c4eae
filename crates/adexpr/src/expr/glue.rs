use crate::error::AdError;
use crate::expr::{Expr, ExprNode, zero_seed};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Evaluate `lhs` for its side effects, then `rhs`. Behaves as `rhs`.
pub struct GlueNode<'a> {
    lhs: Box<Expr<'a>>,
    rhs: Box<Expr<'a>>,
}

impl<'a> GlueNode<'a> {
    pub fn new(lhs: Expr<'a>, rhs: Expr<'a>) -> Self {
        Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl<'a> ExprNode<'a> for GlueNode<'a> {
    fn shape(&self) -> Shape {
        self.rhs.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        self.lhs.feval();
        self.rhs.feval()
    }

    fn beval(&mut self, seed: &[f64]) {
        self.rhs.beval(seed);
        self.lhs.beval(&zero_seed(self.lhs.shape().size()));
    }

    fn bind_cache_size(&self) -> SizePack {
        self.lhs.bind_cache_size() + self.rhs.bind_cache_size()
    }

    fn single_bind_cache_size(&self) -> SizePack {
        self.rhs.single_bind_cache_size()
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self.lhs.bind_cache(cursor);
        self.rhs.bind_cache(cursor)
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.rhs.view()
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.rhs.rebind(view);
    }
}

/// Evaluate a sequence in order. Behaves as the last element.
///
/// Backward visits the sequence in reverse; only the last element
/// receives the seed.
pub struct ForEachNode<'a> {
    init: Vec<Expr<'a>>,
    last: Box<Expr<'a>>,
}

impl<'a> ForEachNode<'a> {
    /// # Errors
    ///
    /// Returns [`AdError::InvalidOperation`] for an empty sequence.
    pub fn new(mut exprs: Vec<Expr<'a>>) -> Result<Self, AdError> {
        let last = exprs.pop().ok_or_else(|| {
            AdError::InvalidOperation("for_each needs at least one expression".into())
        })?;
        Ok(Self {
            init: exprs,
            last: Box::new(last),
        })
    }
}

impl<'a> ExprNode<'a> for ForEachNode<'a> {
    fn shape(&self) -> Shape {
        self.last.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        for expr in &mut self.init {
            expr.feval();
        }
        self.last.feval()
    }

    fn beval(&mut self, seed: &[f64]) {
        self.last.beval(seed);
        for expr in self.init.iter_mut().rev() {
            expr.beval(&zero_seed(expr.shape().size()));
        }
    }

    fn bind_cache_size(&self) -> SizePack {
        self.init
            .iter()
            .fold(self.last.bind_cache_size(), |acc, e| acc + e.bind_cache_size())
    }

    fn single_bind_cache_size(&self) -> SizePack {
        self.last.single_bind_cache_size()
    }

    fn bind_cache(&mut self, cursor: Cursor<'a>) -> Cursor<'a> {
        let cursor = self
            .init
            .iter_mut()
            .fold(cursor, |cursor, e| e.bind_cache(cursor));
        self.last.bind_cache(cursor)
    }

    fn view(&self) -> ValueAdjView<'a> {
        self.last.view()
    }

    fn rebind(&mut self, view: ValueAdjView<'a>) {
        self.last.rebind(view);
    }
}
