use femstuff_la::csr::CsrData;
use femstuff_la::solver::options::{POST_CHECK_SOLVES_SYSTEM, PRE_CHECK_SYMMETRY};
use femstuff_la::{
    check_solves_system, ContainerError, ContainerInterface, DenseMatrix, DenseVector, MatrixInterface,
    NativeSparseMatrix, NativeVector, Solver, SolverBackend, SolverError, SolverOptions, SparseMatrix,
    SparsityPattern, VectorInterface,
};
use femstuff_la::direct::SparseQr;
use femstuff_la::preconditioner::IncompleteLu;
use nalgebra::DMatrix;
use util::{convection_diffusion_2d_rows, poisson_2d_csr, poisson_2d_dense, poisson_2d_rows, pseudo_random_vector};

fn residual_sup_norm<M: MatrixInterface<f64>>(matrix: &M, rhs: &M::Vector, solution: &M::Vector) -> f64 {
    let mut residual = M::Vector::zeros(rhs.size());
    matrix.mv(solution, &mut residual).unwrap();
    residual.sub(rhs).unwrap().sup_norm()
}

fn assert_solves_with_every_type<M>(matrix: &M, rhs: &M::Vector, tol: f64)
where
    M: SolverBackend<f64>,
{
    let solver = Solver::new(matrix);
    for &solver_type in solver.types() {
        let mut x = M::Vector::zeros(matrix.cols());
        solver
            .apply_type(rhs, &mut x, solver_type)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", solver_type, err));
        let residual = residual_sup_norm(matrix, rhs, &x);
        assert!(residual < tol, "'{}': residual {:e} exceeds {:e}", solver_type, residual, tol);
    }
}

/// Symmetric positive definite tridiagonal 50x50 matrix.
fn spd_tridiagonal_50() -> SparseMatrix<f64> {
    let n = 50;
    let mut a = SparseMatrix::new(n, n, &SparsityPattern::tridiagonal(n)).unwrap();
    for i in 0..n {
        a.set_entry(i, i, 4.0 + (i % 3) as f64).unwrap();
        if i + 1 < n {
            a.set_entry(i, i + 1, -1.0).unwrap();
            a.set_entry(i + 1, i, -1.0).unwrap();
        }
    }
    a
}

#[test]
fn sparse_ldlt_solves_spd_system() {
    let a = spd_tridiagonal_50();
    let b = DenseVector::from(pseudo_random_vector(50, 42));
    let mut x = DenseVector::zeros(50);
    Solver::new(&a)
        .apply_type(&b, &mut x, "ldlt.simplicial")
        .unwrap();
    assert!(residual_sup_norm(&a, &b, &x) < 1e-8);
}

#[test]
fn dense_llt_solves_spd_system() {
    let a = DenseMatrix::from(DMatrix::from(spd_tridiagonal_50().backend()));
    let b = DenseVector::from(pseudo_random_vector(50, 7));
    let mut x = DenseVector::zeros(50);
    Solver::new(&a).apply_type(&b, &mut x, "llt").unwrap();
    assert!(residual_sup_norm(&a, &b, &x) < 1e-8);
}

#[test]
fn every_dense_solver_type_solves_poisson() {
    let a = DenseMatrix::from(poisson_2d_dense(5));
    let b = DenseVector::from(pseudo_random_vector(25, 1));
    assert_solves_with_every_type(&a, &b, 1e-8);
}

#[test]
fn every_sparse_solver_type_solves_poisson() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(7));
    let b = DenseVector::from(pseudo_random_vector(49, 2));
    assert_solves_with_every_type(&a, &b, 1e-8);
}

#[test]
fn every_native_solver_type_solves_poisson() {
    let a = NativeSparseMatrix::from_csr_data(CsrData::from_rows(49, poisson_2d_rows(7)));
    let b = NativeVector::from_slice(pseudo_random_vector(49, 3).as_slice());
    assert_solves_with_every_type(&a, &b, 1e-8);
}

#[test]
fn native_solvers_handle_nonsymmetric_matrix() {
    let a = NativeSparseMatrix::from_csr_data(CsrData::from_rows(64, convection_diffusion_2d_rows(8, 2.0)));
    let b = NativeVector::from_slice(pseudo_random_vector(64, 4).as_slice());
    assert_solves_with_every_type(&a, &b, 1e-8);
}

#[test]
fn default_type_is_first_type() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(4));
    let solver = Solver::new(&a);
    assert_eq!(solver.types()[0], "bicgstab.ilut");

    let b = DenseVector::from(pseudo_random_vector(16, 5));
    let mut x = DenseVector::zeros(16);
    solver.apply(&b, &mut x).unwrap();
    assert!(residual_sup_norm(&a, &b, &x) < 1e-8);
}

#[test]
fn unknown_solver_type_is_rejected_before_solving() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(3));
    let b = DenseVector::from_element(9, 1.0);
    let mut x = DenseVector::from_element(9, -7.0);
    let untouched = x.clone();

    let mut options = SolverOptions::with_type("not_a_real_solver");
    options.set("max_iter", "5").set("precision", "1e-3");
    let err = Solver::new(&a)
        .apply_options(&b, &mut x, &options)
        .unwrap_err();
    assert!(matches!(err, SolverError::Configuration { .. }));
    // The error reports the bundle exactly as it was passed in
    assert_eq!(err.options(), Some(&options));
    assert!(x.shares_storage_with(&untouched));

    let err = Solver::new(&a).options("not_a_real_solver").unwrap_err();
    assert!(err.to_string().contains("ldlt.simplicial"));
}

#[test]
fn options_without_type_are_rejected() {
    let a = DenseMatrix::from(poisson_2d_dense(2));
    let b = DenseVector::from_element(4, 1.0);
    let mut x = DenseVector::zeros(4);
    let options: SolverOptions = [("precision", "1e-3")].into_iter().collect();
    let err = Solver::new(&a)
        .apply_options(&b, &mut x, &options)
        .unwrap_err();
    assert!(matches!(err, SolverError::Configuration { .. }));
}

#[test]
fn unparsable_option_value_is_configuration_error() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(3));
    let b = DenseVector::from_element(9, 1.0);
    let mut x = DenseVector::zeros(9);
    let mut options = SolverOptions::with_type("cg.diagonal.lower");
    options.set("max_iter", "many");
    let err = Solver::new(&a)
        .apply_options(&b, &mut x, &options)
        .unwrap_err();
    match err {
        SolverError::Configuration { message, options } => {
            assert!(message.contains("max_iter"));
            assert_eq!(options.get_str("max_iter"), Some("many"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn symmetric_solvers_reject_nonsymmetric_matrix() {
    let a = DenseMatrix::from(DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 0.0, 4.0]));
    let b = DenseVector::from_element(2, 1.0);
    let mut x = DenseVector::zeros(2);

    for solver_type in ["llt", "ldlt"] {
        let err = Solver::new(&a)
            .apply_type(&b, &mut x, solver_type)
            .unwrap_err();
        assert!(matches!(err, SolverError::MatrixRequirement { .. }), "{}", solver_type);
        assert_eq!(err.options().and_then(|o| o.solver_type()), Some(solver_type));
    }
    assert_eq!(x.as_slice(), &[0.0, 0.0]);

    let sparse = SparseMatrix::from_backend(nalgebra_sparse::CsrMatrix::from(a.backend()));
    let err = Solver::new(&sparse)
        .apply_type(&b, &mut x, "cg.identity.lower")
        .unwrap_err();
    assert!(matches!(err, SolverError::MatrixRequirement { .. }));

    // Without the pre-check the LDLT factorization of the lower triangle goes through, but the
    // post-check notices that the result does not solve the nonsymmetric system
    let mut options = SolverOptions::with_type("ldlt");
    options.set(PRE_CHECK_SYMMETRY, 0);
    let err = Solver::new(&a)
        .apply_options(&b, &mut x, &options)
        .unwrap_err();
    assert!(matches!(err, SolverError::SolutionDoesNotSolveSystem { .. }));
}

#[test]
fn symmetry_check_rejects_non_finite_entries() {
    let values = DMatrix::from_row_slice(3, 3, &[4.0, f64::NAN, 0.0, 1.0, 4.0, 0.0, 0.0, 0.0, 4.0]);
    let dense = DenseMatrix::from(values.clone());
    let sparse = SparseMatrix::from_backend(nalgebra_sparse::CsrMatrix::from(&values));
    assert!(dense.symmetry_defect().is_nan());
    assert!(sparse.symmetry_defect().is_nan());

    let b = DenseVector::from_element(3, 1.0);
    let mut x = DenseVector::zeros(3);
    let err = Solver::new(&dense).apply_type(&b, &mut x, "llt").unwrap_err();
    assert!(matches!(err, SolverError::MatrixRequirement { .. }));
    let err = Solver::new(&sparse)
        .apply_type(&b, &mut x, "llt.simplicial")
        .unwrap_err();
    assert!(matches!(err, SolverError::MatrixRequirement { .. }));
    assert_eq!(x.as_slice(), &[0.0, 0.0, 0.0]);
}

/// Diagonally dominant, nonsymmetric tridiagonal matrix.
fn nonsymmetric_tridiagonal(n: usize) -> SparseMatrix<f64> {
    let mut a = SparseMatrix::new(n, n, &SparsityPattern::tridiagonal(n)).unwrap();
    for i in 0..n {
        a.set_entry(i, i, 3.0 + (i % 5) as f64).unwrap();
        if i + 1 < n {
            a.set_entry(i, i + 1, -1.0).unwrap();
            a.set_entry(i + 1, i, -1.5).unwrap();
        }
    }
    a
}

#[test]
fn sparse_direct_solvers_handle_large_banded_system() {
    let n = 2000;
    let a = nonsymmetric_tridiagonal(n);
    let b = DenseVector::from(pseudo_random_vector(n, 21));
    for solver_type in ["lu.sparse", "qr.sparse"] {
        let mut x = DenseVector::zeros(n);
        Solver::new(&a).apply_type(&b, &mut x, solver_type).unwrap();
        let residual = residual_sup_norm(&a, &b, &x);
        assert!(residual < 1e-10, "'{}': residual {:e}", solver_type, residual);
    }

    // Neither factorization fills in outside the band
    let lu = IncompleteLu::complete(&a.view()).unwrap();
    assert_eq!(lu.nnz(), a.nnz());
    let qr = SparseQr::factor(&a.view()).unwrap();
    assert!(qr.r_nnz() <= 3 * n);
}

#[test]
fn sparse_direct_solvers_report_singular_matrix() {
    let a = SparseMatrix::from_backend(nalgebra_sparse::CsrMatrix::from(&DMatrix::from_row_slice(
        2,
        2,
        &[1.0, 1.0, 0.0, 0.0],
    )));
    let b = DenseVector::from_element(2, 1.0);
    for solver_type in ["lu.sparse", "qr.sparse"] {
        let mut x = DenseVector::zeros(2);
        let err = Solver::new(&a).apply_type(&b, &mut x, solver_type).unwrap_err();
        assert!(matches!(err, SolverError::NumericalIssue { .. }), "'{}': {:?}", solver_type, err);
    }
}

#[test]
fn failing_factorization_is_numerical_issue() {
    // Symmetric, but indefinite
    let a = DenseMatrix::from(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]));
    let b = DenseVector::from_element(2, 1.0);
    let mut x = DenseVector::zeros(2);
    let err = Solver::new(&a).apply_type(&b, &mut x, "llt").unwrap_err();
    assert!(matches!(err, SolverError::NumericalIssue { .. }));
    assert!(err.to_string().contains("type = llt"));
}

#[test]
fn iteration_limit_is_no_convergence() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(6));
    let b = DenseVector::from(pseudo_random_vector(36, 6));
    let mut x = DenseVector::zeros(36);
    let mut options = SolverOptions::with_type("bicgstab.identity");
    options.set("max_iter", 1);
    let err = Solver::new(&a)
        .apply_options(&b, &mut x, &options)
        .unwrap_err();
    match err {
        SolverError::NoConvergence { options } => {
            assert_eq!(options.get::<usize>("max_iter"), Ok(1));
            assert_eq!(options.get_str("precision"), Some("1e-10"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(x.l1_norm(), 0.0);
}

#[test]
fn rhs_with_wrong_size_is_container_error() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(2));
    let b = DenseVector::from_element(3, 1.0);
    let mut x = DenseVector::zeros(4);
    let err = Solver::new(&a).apply(&b, &mut x).unwrap_err();
    assert_eq!(
        err,
        SolverError::Container(ContainerError::ShapeMismatch {
            expected: (4, 1),
            actual: (3, 1)
        })
    );
}

#[test]
fn residual_check_rejects_wrong_solution() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(3));
    let exact = DenseVector::from(pseudo_random_vector(9, 8));
    let mut b = DenseVector::zeros(9);
    a.mv(&exact, &mut b).unwrap();
    let options = SolverOptions::with_type("lu.sparse");

    check_solves_system(&a, &b, &exact, 1e-12, &options).unwrap();

    let mut wrong = exact.clone();
    wrong.add_to_entry(4, 1e-3);
    match check_solves_system(&a, &b, &wrong, 1e-5, &options) {
        Err(SolverError::SolutionDoesNotSolveSystem {
            residual,
            threshold,
            options: reported,
        }) => {
            assert!((residual - 4e-3).abs() < 1e-12);
            assert_eq!(threshold, 1e-5);
            assert_eq!(reported, options);
        }
        other => panic!("unexpected result {:?}", other),
    }
    // A huge threshold lets anything finite pass
    check_solves_system(&a, &b, &wrong, 1.0, &options).unwrap();
}

#[test]
fn default_options_are_merged_beneath_user_options() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(3));
    let solver = Solver::new(&a);

    let defaults = solver.options("bicgstab.ilut").unwrap();
    assert_eq!(defaults.get_str("type"), Some("bicgstab.ilut"));
    assert_eq!(defaults.get::<usize>("max_iter"), Ok(10000));
    assert_eq!(defaults.get::<f64>("precision"), Ok(1e-10));
    assert_eq!(defaults.get::<usize>("preconditioner.fill_factor"), Ok(10));
    assert_eq!(defaults.get::<f64>("preconditioner.drop_tol"), Ok(1e-4));
    assert_eq!(defaults.get::<f64>(POST_CHECK_SOLVES_SYSTEM), Ok(1e-5));
    assert!(!defaults.has_key(PRE_CHECK_SYMMETRY));

    let symmetric = solver.options("cg.diagonal.upper").unwrap();
    assert_eq!(symmetric.get::<f64>(PRE_CHECK_SYMMETRY), Ok(1e-8));

    let mut user = SolverOptions::with_type("bicgstab.ilut");
    user.set("precision", "1e-6").set("custom", "kept");
    let merged = user.merged_with_defaults(&defaults);
    assert_eq!(merged.get_str("precision"), Some("1e-6"));
    assert_eq!(merged.get_str("custom"), Some("kept"));
    assert_eq!(merged.get_str("max_iter"), Some("10000"));
    assert_eq!(merged.len(), defaults.len() + 1);

    let native = NativeSparseMatrix::from_csr_data(CsrData::from_rows(9, poisson_2d_rows(3)));
    let amg = Solver::new(&native).options("bicgstab.amg.ilu0").unwrap();
    assert_eq!(amg.get::<usize>("smoother.coarse_target"), Ok(2000));
    assert_eq!(amg.get::<f64>("smoother.prolong_damp"), Ok(1.6));
}

#[test]
fn options_round_trip_through_json() {
    let a = DenseMatrix::from(poisson_2d_dense(2));
    let options = Solver::new(&a).options("ldlt").unwrap();

    let json = serde_json::to_string(&options).unwrap();
    assert!(json.starts_with('{'));
    assert!(json.contains("\"type\":\"ldlt\""));
    let parsed: SolverOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, options);
}

#[test]
fn zero_rhs_gives_zero_solution() {
    let a = SparseMatrix::from_backend(poisson_2d_csr(3));
    let b = DenseVector::zeros(9);
    let mut x = DenseVector::from_element(9, 1.0);
    for solver_type in ["cg.identity.upper", "bicgstab.diagonal"] {
        Solver::new(&a)
            .apply_type(&b, &mut x, solver_type)
            .unwrap();
        assert_eq!(x.sup_norm(), 0.0);
    }
}
