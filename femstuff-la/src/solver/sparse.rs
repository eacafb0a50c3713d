use crate::container::dense::DenseVector;
use crate::container::sparse::SparseMatrix;
use crate::container::MatrixInterface;
use crate::direct::{SimplicialLdlt, SparseQr};
use crate::krylov::{
    BiCgStab, ConjugateGradient, IdentityOperator, KrylovError, KrylovErrorKind, KrylovOutput, KrylovSettings,
    LinearOperator, Triangle,
};
use crate::preconditioner::{IncompleteLu, Jacobi};
use crate::solver::{base_options, largest_defect, ComputationStatus, SolverBackend, SolverError, SolverOptions};
use crate::Real;
use log::debug;
use nalgebra::DMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::CscMatrix;

const TYPES: &[&str] = &[
    "bicgstab.ilut",
    "lu.sparse",
    "llt.simplicial",
    "ldlt.simplicial",
    "bicgstab.diagonal",
    "bicgstab.identity",
    "qr.sparse",
    "cg.diagonal.lower",
    "cg.diagonal.upper",
    "cg.identity.lower",
    "cg.identity.upper",
];

pub(crate) const MAX_ITER: &str = "max_iter";
pub(crate) const PRECISION: &str = "precision";
const FILL_FACTOR: &str = "preconditioner.fill_factor";
const DROP_TOL: &str = "preconditioner.drop_tol";

pub(crate) fn krylov_settings<T: Real>(options: &SolverOptions) -> Result<KrylovSettings<T>, SolverError> {
    let max_iterations = options
        .get(MAX_ITER)
        .map_err(|err| SolverError::configuration(err.to_string(), options))?;
    let tolerance = options
        .get_real(PRECISION)
        .map_err(|err| SolverError::configuration(err.to_string(), options))?;
    Ok(KrylovSettings {
        max_iterations,
        tolerance,
    })
}

pub(crate) fn krylov_status<T: Real>(solver_type: &str, result: Result<KrylovOutput<T>, KrylovError<T>>) -> ComputationStatus {
    match result {
        Ok(output) => {
            debug!("'{}' finished after {} iterations.", solver_type, output.num_iterations);
            ComputationStatus::Success
        }
        Err(err) => {
            debug!("'{}' failed: {}", solver_type, err);
            match err.kind {
                KrylovErrorKind::MaxIterationsReached { .. } => ComputationStatus::NoConvergence,
                _ => ComputationStatus::NumericalIssue,
            }
        }
    }
}

impl<T: Real> SolverBackend<T> for SparseMatrix<T> {
    fn solver_types() -> &'static [&'static str] {
        TYPES
    }

    fn default_solver_options(solver_type: &str) -> Option<SolverOptions> {
        if !TYPES.contains(&solver_type) {
            return None;
        }
        let mut options = base_options(solver_type, Self::requires_symmetry(solver_type));
        if solver_type.starts_with("bicgstab.") || solver_type.starts_with("cg.") {
            options.set(MAX_ITER, "10000").set(PRECISION, "1e-10");
        }
        if solver_type == "bicgstab.ilut" {
            options.set(FILL_FACTOR, "10").set(DROP_TOL, "1e-4");
        }
        Some(options)
    }

    fn requires_symmetry(solver_type: &str) -> bool {
        solver_type.starts_with("cg.") || matches!(solver_type, "llt.simplicial" | "ldlt.simplicial")
    }

    fn symmetry_defect(&self) -> T {
        if self.rows() != self.cols() {
            return T::zero();
        }
        let a = self.backend();
        largest_defect((a - &a.transpose()).values())
    }

    fn dispatch(
        &self,
        solver_type: &str,
        options: &SolverOptions,
        rhs: &DenseVector<T>,
        solution: &mut DenseVector<T>,
    ) -> Result<ComputationStatus, SolverError> {
        if self.rows() != self.cols() {
            return Ok(ComputationStatus::InvalidInput);
        }
        let view = self.view();
        let b = rhs.backend();

        let bicgstab = |preconditioner: &dyn LinearOperator<T>,
                        x: &mut DenseVector<T>|
         -> Result<ComputationStatus, SolverError> {
            let settings = krylov_settings(options)?;
            let result = BiCgStab::new(settings).solve_with_guess(self.backend(), &preconditioner, b, x.backend_mut());
            Ok(krylov_status(solver_type, result))
        };
        let cg = |triangle: Triangle,
                  preconditioner: &dyn LinearOperator<T>,
                  x: &mut DenseVector<T>|
         -> Result<ComputationStatus, SolverError> {
            let settings = krylov_settings(options)?;
            let operator = self.symmetric_part(triangle);
            let result =
                ConjugateGradient::new(settings).solve_with_guess(&operator, &preconditioner, b, x.backend_mut());
            Ok(krylov_status(solver_type, result))
        };

        match solver_type {
            "bicgstab.ilut" => {
                let drop_tolerance = options
                    .get_real(DROP_TOL)
                    .map_err(|err| SolverError::configuration(err.to_string(), options))?;
                let fill_factor = options
                    .get(FILL_FACTOR)
                    .map_err(|err| SolverError::configuration(err.to_string(), options))?;
                match IncompleteLu::threshold(&view, drop_tolerance, fill_factor) {
                    Ok(ilu) => bicgstab(&ilu, solution),
                    Err(err) => {
                        debug!("ILUT factorization failed: {}", err);
                        Ok(ComputationStatus::NumericalIssue)
                    }
                }
            }
            "bicgstab.diagonal" => bicgstab(&Jacobi::from_diagonal(&self.diagonal()), solution),
            "bicgstab.identity" => bicgstab(&IdentityOperator, solution),
            "cg.diagonal.lower" => cg(Triangle::Lower, &Jacobi::from_diagonal(&self.diagonal()), solution),
            "cg.diagonal.upper" => cg(Triangle::Upper, &Jacobi::from_diagonal(&self.diagonal()), solution),
            "cg.identity.lower" => cg(Triangle::Lower, &IdentityOperator, solution),
            "cg.identity.upper" => cg(Triangle::Upper, &IdentityOperator, solution),
            "lu.sparse" => match IncompleteLu::complete(&view) {
                Ok(lu) => {
                    solution.backend_mut().copy_from(b);
                    lu.solve_in_place(solution.backend_mut().as_mut_slice());
                    Ok(ComputationStatus::Success)
                }
                Err(err) => {
                    debug!("Sparse LU factorization failed: {}", err);
                    Ok(ComputationStatus::NumericalIssue)
                }
            },
            "qr.sparse" => match SparseQr::factor(&view) {
                Ok(qr) => {
                    *solution.backend_mut() = qr.solve(b);
                    Ok(ComputationStatus::Success)
                }
                Err(err) => {
                    debug!("Sparse QR factorization failed: {}", err);
                    Ok(ComputationStatus::NumericalIssue)
                }
            },
            "llt.simplicial" => {
                let csc = CscMatrix::from(self.backend());
                match CscCholesky::factor(&csc) {
                    Ok(cholesky) => {
                        let x = cholesky.solve(&DMatrix::from_column_slice(b.len(), 1, b.as_slice()));
                        solution.backend_mut().copy_from(&x.column(0));
                        Ok(ComputationStatus::Success)
                    }
                    Err(err) => {
                        debug!("Sparse Cholesky factorization failed: {:?}", err);
                        Ok(ComputationStatus::NumericalIssue)
                    }
                }
            }
            "ldlt.simplicial" => match SimplicialLdlt::factor(&view) {
                Ok(ldlt) => {
                    *solution.backend_mut() = ldlt.solve(b);
                    Ok(ComputationStatus::Success)
                }
                Err(err) => {
                    debug!("Sparse LDLT factorization failed: {}", err);
                    Ok(ComputationStatus::NumericalIssue)
                }
            },
            _ => Err(SolverError::configuration(
                format!("unknown solver type '{}'", solver_type),
                options,
            )),
        }
    }
}
