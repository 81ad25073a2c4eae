use crate::error::AdError;
use crate::expr::sum::common_shape;
use crate::expr::{Expr, ExprNode, SeedBuf};
use crate::shape::Shape;
use crate::value::{Cursor, SizePack, ValueAdjView};

/// Product of a sequence of same-shaped expressions. Empty products are `1`.
///
/// The partial for term `c` is `seed * prod / x_c`, except where `x_c` is
/// zero: there the product of the other terms is recomputed.
pub struct ProdIterNode<'a> {
    terms: Vec<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> ProdIterNode<'a> {
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
}

impl<'a> ExprNode<'a> for ProdIterNode<'a> {
    fn shape(&self) -> Shape {
        self.view.shape()
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        self.view.fill_val(1.0);
        for term in &mut self.terms {
            let v = term.feval();
            for k in 0..self.view.size() {
                self.view.set_val(k, self.view.val(k) * v.val(k));
            }
        }
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        self.view.set_adj_from(seed);
        let views: Vec<ValueAdjView<'a>> = self.terms.iter().map(|t| t.view()).collect();
        for c in (0..self.terms.len()).rev() {
            let child: SeedBuf = seed
                .iter()
                .enumerate()
                .map(|(k, &s)| {
                    if s == 0.0 {
                        return 0.0;
                    }
                    let xk = views[c].val(k);
                    if xk != 0.0 {
                        s * self.view.val(k) / xk
                    } else {
                        let others: f64 = views
                            .iter()
                            .enumerate()
                            .filter(|&(j, _)| j != c)
                            .map(|(_, v)| v.val(k))
                            .product();
                        s * others
                    }
                })
                .collect();
            self.terms[c].beval(&child);
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

/// Product of all elements of one expression.
pub struct ProdElemNode<'a> {
    expr: Box<Expr<'a>>,
    view: ValueAdjView<'a>,
}

impl<'a> ProdElemNode<'a> {
    pub fn new(expr: Expr<'a>) -> Self {
        Self {
            expr: Box::new(expr),
            view: ValueAdjView::unbound(Shape::Scalar),
        }
    }
}

impl<'a> ExprNode<'a> for ProdElemNode<'a> {
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn feval(&mut self) -> ValueAdjView<'a> {
        let x = self.expr.feval();
        let total: f64 = (0..x.size()).map(|k| x.val(k)).product();
        self.view.set_val(0, total);
        self.view
    }

    fn beval(&mut self, seed: &[f64]) {
        let s = seed[0];
        let x = self.expr.view();
        let n = x.size();
        let f = self.view.val(0);
        let child: SeedBuf = (0..n)
            .map(|k| {
                if s == 0.0 {
                    return 0.0;
                }
                let xk = x.val(k);
                if xk != 0.0 {
                    s * f / xk
                } else {
                    s * (0..n).filter(|&j| j != k).map(|j| x.val(j)).product::<f64>()
                }
            })
            .collect();
        self.expr.beval(&child);
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
