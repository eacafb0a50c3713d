use crate::container::dense::{DenseMatrix, DenseVector};
use crate::direct::DenseLdlt;
use crate::solver::{base_options, largest_defect, ComputationStatus, SolverBackend, SolverError, SolverOptions};
use crate::Real;
use log::debug;

const TYPES: &[&str] = &[
    "lu.partialpiv",
    "qr.householder",
    "llt",
    "ldlt",
    "qr.colpivhouseholder",
    "lu.fullpiv",
    "svd",
];

impl<T: Real> SolverBackend<T> for DenseMatrix<T> {
    fn solver_types() -> &'static [&'static str] {
        TYPES
    }

    fn default_solver_options(solver_type: &str) -> Option<SolverOptions> {
        TYPES
            .contains(&solver_type)
            .then(|| base_options(solver_type, Self::requires_symmetry(solver_type)))
    }

    fn requires_symmetry(solver_type: &str) -> bool {
        matches!(solver_type, "llt" | "ldlt")
    }

    fn symmetry_defect(&self) -> T {
        let a = self.backend();
        if !a.is_square() {
            return T::zero();
        }
        largest_defect((a - a.transpose()).iter())
    }

    fn dispatch(
        &self,
        solver_type: &str,
        options: &SolverOptions,
        rhs: &DenseVector<T>,
        solution: &mut DenseVector<T>,
    ) -> Result<ComputationStatus, SolverError> {
        let a = self.backend();
        if !a.is_square() {
            return Ok(ComputationStatus::InvalidInput);
        }
        let b = rhs.backend();

        let x = match solver_type {
            "lu.partialpiv" => a.clone().lu().solve(b),
            "qr.householder" => a.clone().qr().solve(b),
            "llt" => a.clone().cholesky().map(|llt| llt.solve(b)),
            "ldlt" => DenseLdlt::factor(a).ok().map(|ldlt| ldlt.solve(b)),
            "qr.colpivhouseholder" => a.clone().col_piv_qr().solve(b),
            "lu.fullpiv" => a.clone().full_piv_lu().solve(b),
            "svd" => a.clone().svd(true, true).solve(b, T::default_epsilon()).ok(),
            _ => return Err(SolverError::configuration(format!("unknown solver type '{}'", solver_type), options)),
        };

        match x {
            Some(x) => {
                *solution.backend_mut() = x;
                Ok(ComputationStatus::Success)
            }
            None => {
                debug!("Dense factorization '{}' failed.", solver_type);
                Ok(ComputationStatus::NumericalIssue)
            }
        }
    }
}
