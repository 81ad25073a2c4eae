//! Dense factorizations behind the log-determinant, determinant and
//! log-density nodes.
//!
//! A [`Factorization`] is computed once per forward pass and reused in the
//! backward pass for the inverse and for solves.

use faer::linalg::solvers::{FullPivLu, Ldlt, Llt, Solve};
use faer::{Mat, MatRef, Side};

/// Decomposition used by log-determinant and determinant nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogDetMethod {
    /// Full-pivot LU. Works for any invertible matrix.
    #[default]
    FullPivLu,
    /// `L D L^T`. Symmetric matrices, possibly indefinite.
    Ldlt,
    /// Cholesky. Symmetric positive-definite matrices.
    Llt,
}

enum Factor {
    Lu(FullPivLu<f64>),
    Ldlt(Ldlt<f64>),
    Llt(Llt<f64>),
    Failed,
}

/// A cached factorization of a square matrix.
pub struct Factorization {
    factor: Factor,
    n: usize,
    log_abs_det: f64,
    sign: f64,
    valid: bool,
}

/// `+1` for an even permutation, `-1` for an odd one.
fn permutation_sign(forward: &[usize]) -> f64 {
    let mut visited = vec![false; forward.len()];
    let mut sign = 1.0;
    for start in 0..forward.len() {
        if visited[start] {
            continue;
        }
        let mut len = 0;
        let mut k = start;
        while !visited[k] {
            visited[k] = true;
            k = forward[k];
            len += 1;
        }
        if len % 2 == 0 {
            sign = -sign;
        }
    }
    sign
}

impl Factorization {
    /// Factorize `a` with the requested method.
    ///
    /// The result is marked invalid when the matrix is singular (LU), when
    /// the pivots are not all finite and nonzero (LDLT), or when it is not
    /// positive-definite (LLT).
    pub fn compute(a: MatRef<'_, f64>, method: LogDetMethod) -> Self {
        let n = a.nrows();
        match method {
            LogDetMethod::FullPivLu => {
                let lu = a.full_piv_lu();
                let u = lu.U();
                let mut log_abs_det = 0.0;
                let mut sign = permutation_sign(lu.P().arrays().0)
                    * permutation_sign(lu.Q().arrays().0);
                let mut valid = true;
                for i in 0..n {
                    let d = u[(i, i)];
                    if d == 0.0 || !d.is_finite() {
                        valid = false;
                    }
                    sign *= d.signum();
                    log_abs_det += d.abs().ln();
                }
                Self {
                    factor: Factor::Lu(lu),
                    n,
                    log_abs_det,
                    sign,
                    valid,
                }
            }
            LogDetMethod::Ldlt => match a.ldlt(Side::Lower) {
                Ok(ldlt) => {
                    let d = ldlt.D().column_vector();
                    let log_abs_det: f64 = (0..n).map(|i| d[i].abs().ln()).sum();
                    let sign = (0..n).map(|i| d[i].signum()).product();
                    Self {
                        factor: Factor::Ldlt(ldlt),
                        n,
                        log_abs_det,
                        sign,
                        valid: log_abs_det.is_finite(),
                    }
                }
                Err(_) => Self::failed(n),
            },
            LogDetMethod::Llt => Self::cholesky(a),
        }
    }

    /// Cholesky factorization, invalid unless `a` is positive-definite.
    pub fn cholesky(a: MatRef<'_, f64>) -> Self {
        let n = a.nrows();
        match a.llt(Side::Lower) {
            Ok(llt) => {
                let l = llt.L();
                let log_det_l: f64 = (0..n).map(|i| l[(i, i)].ln()).sum();
                Self {
                    factor: Factor::Llt(llt),
                    n,
                    log_abs_det: 2.0 * log_det_l,
                    sign: 1.0,
                    valid: log_det_l.is_finite(),
                }
            }
            Err(_) => Self::failed(n),
        }
    }

    fn failed(n: usize) -> Self {
        Self {
            factor: Factor::Failed,
            n,
            log_abs_det: f64::NEG_INFINITY,
            sign: 0.0,
            valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// `log |det A|`. `-inf` for a singular matrix.
    pub fn log_abs_det(&self) -> f64 {
        self.log_abs_det
    }

    /// `det A`, zero when the factorization failed or is singular.
    pub fn det(&self) -> f64 {
        if self.valid {
            self.sign * self.log_abs_det.exp()
        } else {
            0.0
        }
    }

    /// `log det L` for a Cholesky factor, i.e. half of `log det A`.
    pub fn half_log_det(&self) -> f64 {
        0.5 * self.log_abs_det
    }

    /// Solve `A X = rhs`. `None` if the factorization failed.
    pub fn solve(&self, rhs: MatRef<'_, f64>) -> Option<Mat<f64>> {
        let mut x = rhs.to_owned();
        match &self.factor {
            Factor::Lu(lu) => lu.solve_in_place(&mut x),
            Factor::Ldlt(ldlt) => ldlt.solve_in_place(&mut x),
            Factor::Llt(llt) => llt.solve_in_place(&mut x),
            Factor::Failed => return None,
        }
        Some(x)
    }

    /// `A^{-1}`, reusing the factorization.
    pub fn inverse(&self) -> Option<Mat<f64>> {
        let identity = Mat::<f64>::identity(self.n, self.n);
        self.solve(identity.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spd() -> Mat<f64> {
        // [[4, 1, 0], [1, 3, 1], [0, 1, 2]]
        Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 4.0,
            (1, 1) => 3.0,
            (2, 2) => 2.0,
            (0, 1) | (1, 0) => 1.0,
            (1, 2) | (2, 1) => 1.0,
            _ => 0.0,
        })
    }

    #[test]
    fn test_all_methods_agree_on_spd() {
        // det = 4*(6-1) - 1*(2-0) = 18
        let a = spd();
        for method in [LogDetMethod::FullPivLu, LogDetMethod::Ldlt, LogDetMethod::Llt] {
            let f = Factorization::compute(a.as_ref(), method);
            assert!(f.is_valid());
            assert_relative_eq!(f.log_abs_det(), 18.0_f64.ln(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inverse() {
        let a = spd();
        let f = Factorization::cholesky(a.as_ref());
        let inv = f.inverse().unwrap();
        let prod = &a * &inv;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(prod[(i, j)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_det_sign() {
        // [[0, 1], [1, 0]] has det -1; [[2, 1], [1, 3]] has det 5
        let swap = Mat::from_fn(2, 2, |i, j| if i == j { 0.0 } else { 1.0 });
        let f = Factorization::compute(swap.as_ref(), LogDetMethod::FullPivLu);
        assert_relative_eq!(f.det(), -1.0, epsilon = 1e-12);

        let a = Mat::from_fn(2, 2, |i, j| match (i, j) {
            (0, 0) => 2.0,
            (1, 1) => 3.0,
            _ => 1.0,
        });
        for method in [LogDetMethod::FullPivLu, LogDetMethod::Ldlt, LogDetMethod::Llt] {
            let f = Factorization::compute(a.as_ref(), method);
            assert_relative_eq!(f.det(), 5.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_permutation_sign() {
        assert_eq!(permutation_sign(&[0, 1, 2]), 1.0);
        assert_eq!(permutation_sign(&[1, 0, 2]), -1.0);
        assert_eq!(permutation_sign(&[1, 2, 0]), 1.0);
    }

    #[test]
    fn test_singular_lu_is_invalid() {
        let a = Mat::from_fn(2, 2, |i, _| (i + 1) as f64);
        let f = Factorization::compute(a.as_ref(), LogDetMethod::FullPivLu);
        assert!(!f.is_valid());
        assert_eq!(f.log_abs_det(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 2.0 });
        let f = Factorization::cholesky(a.as_ref());
        assert!(!f.is_valid());
        assert!(f.inverse().is_none());
    }

    #[test]
    fn test_ldlt_indefinite_is_valid() {
        // det = -3
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 2.0 });
        let f = Factorization::compute(a.as_ref(), LogDetMethod::Ldlt);
        assert!(f.is_valid());
        assert_relative_eq!(f.log_abs_det(), 3.0_f64.ln(), epsilon = 1e-12);
    }
}
