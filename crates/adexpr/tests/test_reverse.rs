//! Integration tests for reverse-mode evaluation.
//!
//! Adjoints are checked against closed forms and against central
//! differences of the forward pass.

use adexpr::{
    AdError, Expr, IntoExpr, LogDetMethod, Var, Workspace, autodiff, autodiff_with_seed,
    bind_cache_size, constant, det, dot, evaluate, exp, expr_hessian, for_each, glue, if_else,
    log, log_det, norm, pow, prod, prod_iter, sin, sqrt, sum, sum_iter, transpose,
};
use approx::assert_relative_eq;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compute numerical gradient using central difference.
///
/// grad_i ≈ (f(x + eps*e_i) - f(x - eps*e_i)) / (2*eps)
fn numerical_gradient(expr: &mut Expr<'_>, var: &Var, eps: f64) -> Vec<f64> {
    let x = var.values();
    let mut grad = vec![0.0; x.len()];
    let mut shifted = x.clone();
    for i in 0..x.len() {
        shifted[i] = x[i] + eps;
        var.set_values(&shifted).unwrap();
        let f_plus = evaluate(expr).scalar();

        shifted[i] = x[i] - eps;
        var.set_values(&shifted).unwrap();
        let f_minus = evaluate(expr).scalar();

        grad[i] = (f_plus - f_minus) / (2.0 * eps);
        shifted[i] = x[i];
    }
    var.set_values(&x).unwrap();
    grad
}

fn assert_gradient(expr: &mut Expr<'_>, vars: &[&Var]) {
    let numeric: Vec<Vec<f64>> = vars
        .iter()
        .map(|v| numerical_gradient(expr, v, 1e-6))
        .collect();
    for v in vars {
        v.reset_adj();
    }
    autodiff(expr).unwrap();
    for (v, expected) in vars.iter().zip(&numeric) {
        for (a, e) in v.adjoints().iter().zip(expected) {
            assert_relative_eq!(*a, *e, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_sum_adjoints() {
    init_logger();
    let x = Var::vector(vec![1.0, 2.0, 3.0]);
    let mut expr = sum(&x);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 6.0);
    assert_eq!(x.adjoints(), vec![1.0, 1.0, 1.0]);
}

#[test]
fn test_repeated_backward_accumulates() {
    let x = Var::scalar(0.7);
    let mut expr = sin(&x) * &x;
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    autodiff(&mut expr).unwrap();
    let once = x.adj();
    autodiff(&mut expr).unwrap();
    assert_relative_eq!(x.adj(), 2.0 * once, epsilon = 1e-14);
    assert_relative_eq!(once, 0.7_f64.sin() + 0.7 * 0.7_f64.cos(), epsilon = 1e-14);
}

#[test]
fn test_prod_with_zero_element() {
    let x = Var::vector(vec![2.0, 0.0, 3.0]);
    let mut expr = prod(&x);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 0.0);
    assert_eq!(x.adjoints(), vec![0.0, 6.0, 0.0]);
}

#[test]
fn test_prod_iter_with_zero_factor() {
    let a = Var::scalar(2.0);
    let b = Var::scalar(0.0);
    let c = Var::scalar(3.0);
    let mut expr = prod_iter([&a, &b, &c], |v| v).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 0.0);
    assert_eq!((a.adj(), b.adj(), c.adj()), (0.0, 6.0, 0.0));
}

#[test]
fn test_pow_negative_exponent_at_zero() {
    let x = Var::scalar(0.0);
    let mut expr = pow::<-1>(&x);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), f64::INFINITY);
    assert_eq!(x.adj(), f64::NEG_INFINITY);
}

#[test]
fn test_pow_matches_numeric() {
    let x = Var::vector(vec![0.5, -1.5, 2.0]);
    let mut expr = sum(pow::<3>(&x) + pow::<-2>(&x));
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_gradient(&mut expr, &[&x]);
}

#[test]
fn test_log_of_zero_is_not_an_error() {
    let x = Var::scalar(0.0);
    let mut expr = log(&x);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_eq!(autodiff(&mut expr).unwrap(), f64::NEG_INFINITY);
    assert_eq!(x.adj(), f64::INFINITY);

    x.set(-1.0);
    assert!(evaluate(&mut expr).scalar().is_nan());
}

#[test]
fn test_broadcast_scalar_receives_summed_seed() {
    let x = Var::vector(vec![1.0, 2.0, 3.0]);
    let a = Var::scalar(2.0);
    let mut expr = sum(&x * &a);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 12.0);
    assert_eq!(a.adj(), 6.0);
    assert_eq!(x.adjoints(), vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_shared_var_accumulates() {
    let x = Var::scalar(1.3);
    let y = Var::scalar(-0.4);
    let mut expr = exp(&x * &y) / (&x + 2.0) - 3.0 * &y;
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_gradient(&mut expr, &[&x, &y]);
}

#[test]
fn test_dot_adjoints() {
    // A is 2x3, column-major
    let a = Var::matrix(2, 3, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).unwrap();
    let v = Var::vector(vec![1.0, -1.0, 0.5]);
    let mut expr = sum(dot(&a, &v).unwrap());
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    // A v = [1 - 2 + 1.5, 4 - 5 + 3]
    assert_relative_eq!(autodiff(&mut expr).unwrap(), 0.5 + 2.0);
    assert_eq!(a.adjoints(), vec![1.0, 1.0, -1.0, -1.0, 0.5, 0.5]);
    assert_eq!(v.adjoints(), vec![5.0, 7.0, 9.0]);
}

#[test]
fn test_dot_rejects_inner_mismatch() {
    let a = Var::matrix(2, 3, vec![0.0; 6]).unwrap();
    let v = Var::vector(vec![1.0, 2.0]);
    assert!(matches!(
        dot(&a, &v),
        Err(AdError::InnerDimensionMismatch { .. })
    ));
}

#[test]
fn test_matrix_chain_matches_numeric() {
    let a = Var::matrix(2, 2, vec![1.0, 0.5, -0.3, 2.0]).unwrap();
    let b = Var::matrix(2, 2, vec![0.2, 1.1, 0.7, -0.4]).unwrap();
    let mut expr = norm(dot(transpose(&a), &b).unwrap()) + sum(sin(&a));
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_gradient(&mut expr, &[&a, &b]);
}

#[test]
fn test_log_det_and_det() {
    // X = [[4, 1], [2, 3]], det = 10
    let x = Var::matrix(2, 2, vec![4.0, 2.0, 1.0, 3.0]).unwrap();
    let mut expr = log_det(&x, LogDetMethod::default()).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_relative_eq!(autodiff(&mut expr).unwrap(), 10.0_f64.ln(), epsilon = 1e-12);
    // X^-T, column-major
    let expected = [0.3, -0.1, -0.2, 0.4];
    for (a, e) in x.adjoints().iter().zip(expected) {
        assert_relative_eq!(*a, e, epsilon = 1e-12);
    }

    x.reset_adj();
    let mut expr = det(&x, LogDetMethod::default()).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_relative_eq!(autodiff(&mut expr).unwrap(), 10.0, epsilon = 1e-12);
    for (a, e) in x.adjoints().iter().zip(expected) {
        assert_relative_eq!(*a, 10.0 * e, epsilon = 1e-12);
    }
}

#[test]
fn test_log_det_rejects_non_square() {
    let x = Var::matrix(2, 3, vec![0.0; 6]).unwrap();
    assert!(matches!(
        log_det(&x, LogDetMethod::Llt),
        Err(AdError::NotSquareMatrix { .. })
    ));
}

#[test]
fn test_log_det_cholesky_not_positive_definite() {
    let x = Var::self_adjoint(2, vec![1.0, 2.0, 2.0, 1.0]).unwrap();
    let mut expr = log_det(&x, LogDetMethod::Llt).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), f64::NEG_INFINITY);
    assert_eq!(x.adjoints(), vec![0.0; 4]);
}

#[test]
fn test_assign_aliases_placeholder() {
    let x = Var::scalar(1.5);
    let p = Var::scalar(0.0);
    // p = x^2; sin(p) * p references the placeholder twice
    let mut expr = glue(p.assign(&x * &x).unwrap(), sin(&p) * &p);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    let value = autodiff(&mut expr).unwrap();
    let w: f64 = 2.25;
    assert_relative_eq!(p.get(), w);
    assert_relative_eq!(value, w.sin() * w, epsilon = 1e-14);
    assert_relative_eq!(p.adj(), w.cos() * w + w.sin(), epsilon = 1e-14);
    assert_relative_eq!(x.adj(), (w.cos() * w + w.sin()) * 3.0, epsilon = 1e-14);
}

#[test]
fn test_op_eq_square_in_place() {
    let x = Var::scalar(3.0);
    let mut expr = x.mul_eq(&x).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 9.0);
    assert_eq!(x.adj(), 6.0);
    // the backward pass undoes the update
    assert_eq!(x.get(), 3.0);
}

#[test]
fn test_op_eq_rejects_wider_operand() {
    let x = Var::scalar(1.0);
    let v = Var::vector(vec![1.0, 2.0]);
    assert!(x.add_eq(&v).is_err());
}

#[test]
fn test_if_else_seeds_selected_branch() {
    let x = Var::scalar(1.0);
    let y = Var::scalar(2.0);
    let cond = x.view().into_expr().less_than(2.0);
    let mut expr = if_else(cond, &x * &y, &y * &y).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 2.0);
    assert_eq!((x.adj(), y.adj()), (2.0, 1.0));

    x.set(3.0);
    x.reset_adj();
    y.reset_adj();
    assert_eq!(autodiff(&mut expr).unwrap(), 4.0);
    assert_eq!((x.adj(), y.adj()), (0.0, 4.0));
}

#[test]
fn test_if_else_folds_constants() {
    let expr = if_else(constant(0.0), constant(1.0), constant(2.0)).unwrap();
    assert_eq!(expr.as_constant().map(|c| c.values()[0]), Some(2.0));
}

#[test]
fn test_sum_iter_and_for_each() {
    let xs: Vec<Var> = (1..=3).map(|k| Var::scalar(k as f64)).collect();
    let mut expr = sum_iter(&xs, |x| x * x).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_eq!(autodiff(&mut expr).unwrap(), 14.0);
    assert_eq!(
        xs.iter().map(Var::adj).collect::<Vec<_>>(),
        vec![2.0, 4.0, 6.0]
    );

    let mut expr = for_each(&xs, |x| sin(x)).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();
    assert_relative_eq!(autodiff(&mut expr).unwrap(), 3.0_f64.sin());
    // only the last expression is differentiated
    assert_eq!(xs[0].adj(), 2.0);
    assert_relative_eq!(xs[2].adj(), 6.0 + 3.0_f64.cos());

    assert!(for_each(Vec::<&Var>::new(), |x| x).is_err());
}

#[test]
fn test_bind_rejects_small_workspace() {
    let x = Var::vector(vec![1.0, 2.0]);
    let mut expr = sum(sin(&x) * &x);
    let ws = Workspace::new(adexpr::SizePack::new(1, 1));
    assert!(matches!(
        ws.bind(&mut expr),
        Err(AdError::WorkspaceTooSmall { .. })
    ));
}

#[test]
fn test_zero_seed_through_unused_placeholder() {
    // sqrt'(0) is infinite, but p never reaches the result
    let x = Var::scalar(0.0);
    let y = Var::scalar(2.0);
    let p = Var::scalar(0.0);
    let mut expr = glue(p.assign(sqrt(&x)).unwrap(), &y * &y);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 4.0);
    assert_eq!(x.adj(), 0.0);
    assert_eq!(y.adj(), 4.0);
}

#[test]
fn test_zero_seed_entry_at_log_of_zero() {
    let x = Var::vector(vec![0.0, 1.0]);
    let mut expr = log(&x);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    let value = autodiff_with_seed(&mut expr, &[0.0, 1.0]).unwrap();
    assert_eq!(value.values(), vec![f64::NEG_INFINITY, 0.0]);
    assert_eq!(x.adjoints(), vec![0.0, 1.0]);
}

#[test]
fn test_zero_seed_through_division_by_zero() {
    let x = Var::scalar(1.0);
    let y = Var::scalar(0.0);
    let z = Var::scalar(3.0);
    let mut expr = for_each([&x / &y, &z * 2.0], |e| e).unwrap();
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 6.0);
    assert_eq!((x.adj(), y.adj(), z.adj()), (0.0, 0.0, 2.0));
}

#[test]
fn test_log_det_forwards_zero_seed_to_placeholder() {
    init_logger();
    // q = 2a feeds log_det on the discarded side of the glue, and sum(q)
    // is the result
    let a = Var::matrix(2, 2, vec![4.0, 2.0, 1.0, 3.0]).unwrap();
    let q = Var::matrix(2, 2, vec![0.0; 4]).unwrap();
    let lhs = log_det(q.assign(&a * 2.0).unwrap(), LogDetMethod::default()).unwrap();
    let mut expr = glue(lhs, sum(&q));
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_relative_eq!(autodiff(&mut expr).unwrap(), 20.0);
    assert_eq!(a.adjoints(), vec![2.0; 4]);

    // an invalid factorization also lets the placeholder adjoint through
    let b = Var::matrix(2, 2, vec![1.0, 1.0, 1.0, 1.0]).unwrap();
    let r = Var::matrix(2, 2, vec![0.0; 4]).unwrap();
    let singular = log_det(r.assign(&b * 2.0).unwrap(), LogDetMethod::FullPivLu).unwrap();
    let mut expr = singular + sum(&r);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), f64::NEG_INFINITY);
    assert_eq!(b.adjoints(), vec![2.0; 4]);
}

#[test]
fn test_assign_rebinds_matrix_product_root() {
    let a = Var::matrix(2, 3, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).unwrap();
    let v = Var::vector(vec![0.5, -1.0, 0.25]);
    let w = Var::vector(vec![0.0; 2]);
    let mut expr = glue(w.assign(dot(&a, &v).unwrap()).unwrap(), sum(&w * &w));
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    // the product writes straight into w
    evaluate(&mut expr);
    assert_eq!(w.values(), vec![-0.75, -1.5]);
    assert_gradient(&mut expr, &[&a, &v]);
}

#[test]
fn test_assign_wraps_compound_assignment() {
    // p = (x *= y); p * x = (x0 y)^2
    let x = Var::scalar(2.0);
    let y = Var::scalar(3.0);
    let p = Var::scalar(0.0);
    let mut expr = glue(p.assign(x.mul_eq(&y).unwrap()).unwrap(), &p * &x);
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 36.0);
    assert_eq!(p.get(), 6.0);
    assert_eq!(x.adj(), 36.0);
    assert_eq!(y.adj(), 24.0);
    assert_eq!(x.get(), 2.0);
}

#[test]
fn test_chained_compound_assignment_restores_value() {
    // x *= y; x += y^2, so the result is x0 y + y^2
    let x = Var::scalar(2.0);
    let y = Var::scalar(3.0);
    let mut expr = glue(x.mul_eq(&y).unwrap(), x.add_eq(&y * &y).unwrap());
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    assert_eq!(autodiff(&mut expr).unwrap(), 15.0);
    assert_eq!(x.adj(), 3.0);
    assert_eq!(y.adj(), 8.0);
    assert_eq!(x.get(), 2.0);

    // a second pass starts from the restored value
    x.reset_adj();
    y.reset_adj();
    assert_eq!(autodiff(&mut expr).unwrap(), 15.0);
    assert_eq!((x.adj(), y.adj()), (3.0, 8.0));
}

#[test]
fn test_bind_twice_is_idempotent() {
    let x = Var::vector(vec![0.4, 1.1]);
    let p = Var::vector(vec![0.0; 2]);
    let mut expr = glue(p.assign(sin(&x)).unwrap(), sum(&p * &x));
    let size = bind_cache_size(&expr);
    let ws = Workspace::for_expr(&expr);

    ws.bind(&mut expr).unwrap();
    let first = autodiff(&mut expr).unwrap();
    let first_adj = x.adjoints();

    ws.bind(&mut expr).unwrap();
    assert_eq!(bind_cache_size(&expr), size);
    x.reset_adj();
    p.reset_adj();
    assert_eq!(autodiff(&mut expr).unwrap(), first);
    assert_eq!(x.adjoints(), first_adj);

    // the placeholder is a leaf too, its adjoint accumulates
    p.reset_adj();
    assert_gradient(&mut expr, &[&x]);
}

#[test]
fn test_expr_hessian_of_matrix_product() {
    // norm(A v) = v^T A^T A v, so H = 2 A^T A
    let a = Var::matrix(2, 2, vec![1.0, 3.0, 2.0, -1.0]).unwrap();
    let v = Var::vector(vec![0.5, 2.0]);
    let mut expr = norm(dot(&a, &v).unwrap());
    let ws = Workspace::for_expr(&expr);
    ws.bind(&mut expr).unwrap();

    let (value, grad, h) = expr_hessian(&mut expr, &[&v], 1e-4).unwrap();
    // A v = [4.5, -0.5]
    assert_relative_eq!(value, 20.5, epsilon = 1e-12);
    assert_relative_eq!(grad[0], 2.0 * (4.5 - 1.5), epsilon = 1e-12);
    assert_relative_eq!(grad[1], 2.0 * (9.0 + 0.5), epsilon = 1e-12);
    let expected = [[20.0, -2.0], [-2.0, 10.0]];
    for i in 0..2 {
        for j in 0..2 {
            assert_relative_eq!(h[(i, j)], expected[i][j], epsilon = 1e-6);
        }
    }
    assert_eq!(v.values(), vec![0.5, 2.0]);
}
