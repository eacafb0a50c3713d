use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use std::collections::BTreeMap;

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// Rows of the five-point Laplacian on an `n x n` grid with Dirichlet boundary, numbered with
/// x running fastest. The matrix is symmetric positive definite.
pub fn poisson_2d_rows(n: usize) -> Vec<BTreeMap<usize, f64>> {
    let index = |i: usize, j: usize| j * n + i;
    let mut rows = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let mut row = BTreeMap::new();
            row.insert(index(i, j), 4.0);
            if i > 0 {
                row.insert(index(i - 1, j), -1.0);
            }
            if i + 1 < n {
                row.insert(index(i + 1, j), -1.0);
            }
            if j > 0 {
                row.insert(index(i, j - 1), -1.0);
            }
            if j + 1 < n {
                row.insert(index(i, j + 1), -1.0);
            }
            rows.push(row);
        }
    }
    rows
}

pub fn poisson_2d_csr(n: usize) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(n * n, n * n);
    for (i, row) in poisson_2d_rows(n).into_iter().enumerate() {
        for (j, a_ij) in row {
            coo.push(i, j, a_ij);
        }
    }
    CsrMatrix::from(&coo)
}

pub fn poisson_2d_dense(n: usize) -> DMatrix<f64> {
    let mut a = DMatrix::zeros(n * n, n * n);
    for (i, row) in poisson_2d_rows(n).into_iter().enumerate() {
        for (j, a_ij) in row {
            a[(i, j)] = a_ij;
        }
    }
    a
}

/// Upwinded convection-diffusion operator on an `n x n` grid. Diagonally dominant, but not
/// symmetric.
pub fn convection_diffusion_2d_rows(n: usize, velocity: f64) -> Vec<BTreeMap<usize, f64>> {
    let mut rows = poisson_2d_rows(n);
    for (i, row) in rows.iter_mut().enumerate() {
        *row.entry(i).or_insert(0.0) += velocity;
        if i % n > 0 {
            *row.entry(i - 1).or_insert(0.0) -= velocity;
        }
    }
    rows
}

/// Deterministic vector with entries in `[-1, 1]`, suitable as a right-hand side.
pub fn pseudo_random_vector(n: usize, seed: u64) -> DVector<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    DVector::from_fn(n, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    })
}
