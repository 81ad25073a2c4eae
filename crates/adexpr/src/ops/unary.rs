//! Unary operator functors.

use std::f64::consts::FRAC_2_SQRT_PI;

use crate::scalar::Scalar;

/// A differentiable function of one argument.
pub trait UnaryOp {
    /// Name used in debug output.
    const NAME: &'static str;

    /// Forward value `f(x)`.
    fn fmap<T: Scalar>(x: T) -> T;

    /// Seed for the operand: `seed * f'(x)`, where `f = fmap(x)`.
    fn bmap<T: Scalar>(seed: T, x: T, f: T) -> T;
}

/// Negation.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neg;

impl UnaryOp for Neg {
    const NAME: &'static str = "neg";

    fn fmap<T: Scalar>(x: T) -> T {
        -x
    }

    fn bmap<T: Scalar>(seed: T, _x: T, _f: T) -> T {
        -seed
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sin;

impl UnaryOp for Sin {
    const NAME: &'static str = "sin";

    fn fmap<T: Scalar>(x: T) -> T {
        x.sin()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        seed * x.cos()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Cos;

impl UnaryOp for Cos {
    const NAME: &'static str = "cos";

    fn fmap<T: Scalar>(x: T) -> T {
        x.cos()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        -seed * x.sin()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Tan;

impl UnaryOp for Tan {
    const NAME: &'static str = "tan";

    fn fmap<T: Scalar>(x: T) -> T {
        x.tan()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        let c = x.cos();
        seed / (c * c)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Asin;

impl UnaryOp for Asin {
    const NAME: &'static str = "asin";

    fn fmap<T: Scalar>(x: T) -> T {
        x.asin()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        seed / (T::one() - x * x).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Acos;

impl UnaryOp for Acos {
    const NAME: &'static str = "acos";

    fn fmap<T: Scalar>(x: T) -> T {
        x.acos()
    }

    fn bmap<T: Scalar>(seed: T, x: T, f: T) -> T {
        -Asin::bmap(seed, x, f)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Atan;

impl UnaryOp for Atan {
    const NAME: &'static str = "atan";

    fn fmap<T: Scalar>(x: T) -> T {
        x.atan()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        seed / (T::one() + x * x)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sinh;

impl UnaryOp for Sinh {
    const NAME: &'static str = "sinh";

    fn fmap<T: Scalar>(x: T) -> T {
        x.sinh()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        seed * x.cosh()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Cosh;

impl UnaryOp for Cosh {
    const NAME: &'static str = "cosh";

    fn fmap<T: Scalar>(x: T) -> T {
        x.cosh()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        seed * x.sinh()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Tanh;

impl UnaryOp for Tanh {
    const NAME: &'static str = "tanh";

    fn fmap<T: Scalar>(x: T) -> T {
        x.tanh()
    }

    fn bmap<T: Scalar>(seed: T, _x: T, f: T) -> T {
        seed * (T::one() - f * f)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Exp;

impl UnaryOp for Exp {
    const NAME: &'static str = "exp";

    fn fmap<T: Scalar>(x: T) -> T {
        x.exp()
    }

    fn bmap<T: Scalar>(seed: T, _x: T, f: T) -> T {
        seed * f
    }
}

/// Natural logarithm. `log(0)` is `-inf`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl UnaryOp for Log {
    const NAME: &'static str = "log";

    fn fmap<T: Scalar>(x: T) -> T {
        x.ln()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        seed / x
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sqrt;

impl UnaryOp for Sqrt {
    const NAME: &'static str = "sqrt";

    fn fmap<T: Scalar>(x: T) -> T {
        x.sqrt()
    }

    fn bmap<T: Scalar>(seed: T, _x: T, f: T) -> T {
        T::from_f64(0.5) * seed / f
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Erf;

impl UnaryOp for Erf {
    const NAME: &'static str = "erf";

    fn fmap<T: Scalar>(x: T) -> T {
        x.erf()
    }

    fn bmap<T: Scalar>(seed: T, x: T, _f: T) -> T {
        T::from_f64(FRAC_2_SQRT_PI) * seed * (-(x * x)).exp()
    }
}

/// Logistic function `1 / (1 + e^-x)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sigmoid;

impl UnaryOp for Sigmoid {
    const NAME: &'static str = "sigmoid";

    fn fmap<T: Scalar>(x: T) -> T {
        T::one() / (T::one() + (-x).exp())
    }

    fn bmap<T: Scalar>(seed: T, _x: T, f: T) -> T {
        seed * f * (T::one() - f)
    }
}

/// Runtime tag selecting a unary functor inside an expression node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryFn {
    Neg,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Sqrt,
    Erf,
    Sigmoid,
}

impl UnaryFn {
    pub fn name(self) -> &'static str {
        match self {
            UnaryFn::Neg => Neg::NAME,
            UnaryFn::Sin => Sin::NAME,
            UnaryFn::Cos => Cos::NAME,
            UnaryFn::Tan => Tan::NAME,
            UnaryFn::Asin => Asin::NAME,
            UnaryFn::Acos => Acos::NAME,
            UnaryFn::Atan => Atan::NAME,
            UnaryFn::Sinh => Sinh::NAME,
            UnaryFn::Cosh => Cosh::NAME,
            UnaryFn::Tanh => Tanh::NAME,
            UnaryFn::Exp => Exp::NAME,
            UnaryFn::Log => Log::NAME,
            UnaryFn::Sqrt => Sqrt::NAME,
            UnaryFn::Erf => Erf::NAME,
            UnaryFn::Sigmoid => Sigmoid::NAME,
        }
    }

    pub fn fmap(self, x: f64) -> f64 {
        match self {
            UnaryFn::Neg => Neg::fmap(x),
            UnaryFn::Sin => Sin::fmap(x),
            UnaryFn::Cos => Cos::fmap(x),
            UnaryFn::Tan => Tan::fmap(x),
            UnaryFn::Asin => Asin::fmap(x),
            UnaryFn::Acos => Acos::fmap(x),
            UnaryFn::Atan => Atan::fmap(x),
            UnaryFn::Sinh => Sinh::fmap(x),
            UnaryFn::Cosh => Cosh::fmap(x),
            UnaryFn::Tanh => Tanh::fmap(x),
            UnaryFn::Exp => Exp::fmap(x),
            UnaryFn::Log => Log::fmap(x),
            UnaryFn::Sqrt => Sqrt::fmap(x),
            UnaryFn::Erf => Erf::fmap(x),
            UnaryFn::Sigmoid => Sigmoid::fmap(x),
        }
    }

    /// Operand seed for an `f64` seed. A zero seed maps to zero even where
    /// `f'(x)` is infinite.
    pub fn bmap(self, seed: f64, x: f64, f: f64) -> f64 {
        if seed == 0.0 {
            return 0.0;
        }
        match self {
            UnaryFn::Neg => Neg::bmap(seed, x, f),
            UnaryFn::Sin => Sin::bmap(seed, x, f),
            UnaryFn::Cos => Cos::bmap(seed, x, f),
            UnaryFn::Tan => Tan::bmap(seed, x, f),
            UnaryFn::Asin => Asin::bmap(seed, x, f),
            UnaryFn::Acos => Acos::bmap(seed, x, f),
            UnaryFn::Atan => Atan::bmap(seed, x, f),
            UnaryFn::Sinh => Sinh::bmap(seed, x, f),
            UnaryFn::Cosh => Cosh::bmap(seed, x, f),
            UnaryFn::Tanh => Tanh::bmap(seed, x, f),
            UnaryFn::Exp => Exp::bmap(seed, x, f),
            UnaryFn::Log => Log::bmap(seed, x, f),
            UnaryFn::Sqrt => Sqrt::bmap(seed, x, f),
            UnaryFn::Erf => Erf::bmap(seed, x, f),
            UnaryFn::Sigmoid => Sigmoid::bmap(seed, x, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [UnaryFn; 15] = [
        UnaryFn::Neg,
        UnaryFn::Sin,
        UnaryFn::Cos,
        UnaryFn::Tan,
        UnaryFn::Asin,
        UnaryFn::Acos,
        UnaryFn::Atan,
        UnaryFn::Sinh,
        UnaryFn::Cosh,
        UnaryFn::Tanh,
        UnaryFn::Exp,
        UnaryFn::Log,
        UnaryFn::Sqrt,
        UnaryFn::Erf,
        UnaryFn::Sigmoid,
    ];

    #[test]
    fn test_bmap_matches_central_difference() {
        let eps = 1e-6;
        let seed = 1.7;
        for op in ALL {
            let x = 0.37;
            let f = op.fmap(x);
            let numerical = (op.fmap(x + eps) - op.fmap(x - eps)) / (2.0 * eps);
            assert_relative_eq!(op.bmap(seed, x, f), seed * numerical, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_known_values() {
        assert_eq!(UnaryFn::Neg.fmap(2.0), -2.0);
        assert_eq!(UnaryFn::Exp.fmap(0.0), 1.0);
        assert_eq!(UnaryFn::Log.fmap(0.0), f64::NEG_INFINITY);
        assert_relative_eq!(UnaryFn::Sigmoid.fmap(0.0), 0.5);
        assert_relative_eq!(UnaryFn::Sqrt.fmap(4.0), 2.0);
    }

    #[test]
    fn test_zero_seed_at_domain_edge() {
        // f'(0) is infinite for log and sqrt, tan' is infinite at pi/2
        assert_eq!(UnaryFn::Log.bmap(0.0, 0.0, UnaryFn::Log.fmap(0.0)), 0.0);
        assert_eq!(UnaryFn::Sqrt.bmap(0.0, 0.0, 0.0), 0.0);
        assert_eq!(UnaryFn::Asin.bmap(0.0, 1.0, UnaryFn::Asin.fmap(1.0)), 0.0);
        assert_eq!(UnaryFn::Log.bmap(1.0, 0.0, f64::NEG_INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_names_are_distinct() {
        let mut names: Vec<_> = ALL.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }
}
