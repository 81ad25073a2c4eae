//! Binary operator functors.
//!
//! Comparison and logical operators evaluate to `1` or `0` and are not
//! differentiable: their backward maps return zero and nodes built from
//! them never claim an adjoint slot.

use crate::scalar::Scalar;

/// A function of two arguments.
pub trait BinaryOp {
    /// Name used in debug output.
    const NAME: &'static str;

    /// Comparison and logical operators have no gradient path.
    const IS_COMPARISON: bool = false;

    /// Forward value `f(x, y)`.
    fn fmap<T: Scalar>(x: T, y: T) -> T;

    /// Seed for the left operand, `seed * df/dx`.
    fn blmap<T: Scalar>(seed: T, x: T, y: T, f: T) -> T;

    /// Seed for the right operand, `seed * df/dy`.
    fn brmap<T: Scalar>(seed: T, x: T, y: T, f: T) -> T;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Add;

impl BinaryOp for Add {
    const NAME: &'static str = "add";

    fn fmap<T: Scalar>(x: T, y: T) -> T {
        x + y
    }

    fn blmap<T: Scalar>(seed: T, _x: T, _y: T, _f: T) -> T {
        seed
    }

    fn brmap<T: Scalar>(seed: T, _x: T, _y: T, _f: T) -> T {
        seed
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sub;

impl BinaryOp for Sub {
    const NAME: &'static str = "sub";

    fn fmap<T: Scalar>(x: T, y: T) -> T {
        x - y
    }

    fn blmap<T: Scalar>(seed: T, _x: T, _y: T, _f: T) -> T {
        seed
    }

    fn brmap<T: Scalar>(seed: T, _x: T, _y: T, _f: T) -> T {
        -seed
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Mul;

impl BinaryOp for Mul {
    const NAME: &'static str = "mul";

    fn fmap<T: Scalar>(x: T, y: T) -> T {
        x * y
    }

    fn blmap<T: Scalar>(seed: T, _x: T, y: T, _f: T) -> T {
        seed * y
    }

    fn brmap<T: Scalar>(seed: T, x: T, _y: T, _f: T) -> T {
        seed * x
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Div;

impl BinaryOp for Div {
    const NAME: &'static str = "div";

    fn fmap<T: Scalar>(x: T, y: T) -> T {
        x / y
    }

    fn blmap<T: Scalar>(seed: T, _x: T, y: T, _f: T) -> T {
        seed / y
    }

    // d(x/y)/dy = -x/y^2 = -f/y
    fn brmap<T: Scalar>(seed: T, _x: T, y: T, f: T) -> T {
        -seed * f / y
    }
}

fn indicator<T: Scalar>(condition: bool) -> T {
    if condition { T::one() } else { T::zero() }
}

fn truthy<T: Scalar>(x: T) -> bool {
    x != T::zero()
}

macro_rules! comparison_op {
    ($(#[$doc:meta])* $name:ident, $label:literal, |$x:ident, $y:ident| $cond:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl BinaryOp for $name {
            const NAME: &'static str = $label;
            const IS_COMPARISON: bool = true;

            fn fmap<T: Scalar>($x: T, $y: T) -> T {
                indicator($cond)
            }

            fn blmap<T: Scalar>(_seed: T, _x: T, _y: T, _f: T) -> T {
                T::zero()
            }

            fn brmap<T: Scalar>(_seed: T, _x: T, _y: T, _f: T) -> T {
                T::zero()
            }
        }
    };
}

comparison_op!(LessThan, "lt", |x, y| x < y);
comparison_op!(LessThanEq, "le", |x, y| x <= y);
comparison_op!(GreaterThan, "gt", |x, y| x > y);
comparison_op!(GreaterThanEq, "ge", |x, y| x >= y);
comparison_op!(Equal, "eq", |x, y| x == y);
comparison_op!(NotEqual, "ne", |x, y| x != y);
comparison_op!(
    /// Both operands nonzero.
    LogicalAnd,
    "and",
    |x, y| truthy(x) && truthy(y)
);
comparison_op!(
    /// Either operand nonzero.
    LogicalOr,
    "or",
    |x, y| truthy(x) || truthy(y)
);

/// Runtime tag selecting a binary functor inside an expression node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryFn {
    Add,
    Sub,
    Mul,
    Div,
    LessThan,
    LessThanEq,
    GreaterThan,
    GreaterThanEq,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryFn {
    pub fn name(self) -> &'static str {
        match self {
            BinaryFn::Add => Add::NAME,
            BinaryFn::Sub => Sub::NAME,
            BinaryFn::Mul => Mul::NAME,
            BinaryFn::Div => Div::NAME,
            BinaryFn::LessThan => LessThan::NAME,
            BinaryFn::LessThanEq => LessThanEq::NAME,
            BinaryFn::GreaterThan => GreaterThan::NAME,
            BinaryFn::GreaterThanEq => GreaterThanEq::NAME,
            BinaryFn::Equal => Equal::NAME,
            BinaryFn::NotEqual => NotEqual::NAME,
            BinaryFn::LogicalAnd => LogicalAnd::NAME,
            BinaryFn::LogicalOr => LogicalOr::NAME,
        }
    }

    pub fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryFn::Add | BinaryFn::Sub | BinaryFn::Mul | BinaryFn::Div
        )
    }

    pub fn fmap(self, x: f64, y: f64) -> f64 {
        match self {
            BinaryFn::Add => Add::fmap(x, y),
            BinaryFn::Sub => Sub::fmap(x, y),
            BinaryFn::Mul => Mul::fmap(x, y),
            BinaryFn::Div => Div::fmap(x, y),
            BinaryFn::LessThan => LessThan::fmap(x, y),
            BinaryFn::LessThanEq => LessThanEq::fmap(x, y),
            BinaryFn::GreaterThan => GreaterThan::fmap(x, y),
            BinaryFn::GreaterThanEq => GreaterThanEq::fmap(x, y),
            BinaryFn::Equal => Equal::fmap(x, y),
            BinaryFn::NotEqual => NotEqual::fmap(x, y),
            BinaryFn::LogicalAnd => LogicalAnd::fmap(x, y),
            BinaryFn::LogicalOr => LogicalOr::fmap(x, y),
        }
    }

    /// Left operand seed. Zero seeds stay zero at domain edges.
    pub fn blmap(self, seed: f64, x: f64, y: f64, f: f64) -> f64 {
        if seed == 0.0 {
            return 0.0;
        }
        match self {
            BinaryFn::Add => Add::blmap(seed, x, y, f),
            BinaryFn::Sub => Sub::blmap(seed, x, y, f),
            BinaryFn::Mul => Mul::blmap(seed, x, y, f),
            BinaryFn::Div => Div::blmap(seed, x, y, f),
            _ => 0.0,
        }
    }

    /// Right operand seed. Zero seeds stay zero at domain edges.
    pub fn brmap(self, seed: f64, x: f64, y: f64, f: f64) -> f64 {
        if seed == 0.0 {
            return 0.0;
        }
        match self {
            BinaryFn::Add => Add::brmap(seed, x, y, f),
            BinaryFn::Sub => Sub::brmap(seed, x, y, f),
            BinaryFn::Mul => Mul::brmap(seed, x, y, f),
            BinaryFn::Div => Div::brmap(seed, x, y, f),
            _ => 0.0,
        }
    }
}
