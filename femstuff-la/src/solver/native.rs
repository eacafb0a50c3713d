use crate::container::native::{NativeSparseMatrix, NativeVector};
use crate::container::VectorInterface;
use crate::krylov::BiCgStab;
use crate::preconditioner::{AggregationAmg, AmgSettings, IncompleteLu};
use crate::solver::sparse::{krylov_settings, krylov_status, MAX_ITER, PRECISION};
use crate::solver::{base_options, ComputationStatus, SolverBackend, SolverError, SolverOptions};
use crate::Real;
use log::{debug, info};
use nalgebra::{DVectorView, DVectorViewMut};
use std::str::FromStr;

const TYPES: &[&str] = &["bicgstab.amg.ilu0", "bicgstab.ilut"];

const VERBOSE: &str = "verbose";
const ILU_LEVEL: &str = "preconditioner.iterations";
const ILU_RELAXATION: &str = "preconditioner.relaxation_factor";
const SMOOTHER_ITERATIONS: &str = "smoother.iterations";
const SMOOTHER_RELAXATION: &str = "smoother.relaxation_factor";
const MAX_LEVEL: &str = "smoother.max_level";
const COARSE_TARGET: &str = "smoother.coarse_target";
const MIN_COARSE_RATE: &str = "smoother.min_coarse_rate";
const PROLONG_DAMP: &str = "smoother.prolong_damp";
const ANISOTROPY_DIM: &str = "smoother.anisotropy_dim";
const SMOOTHER_VERBOSE: &str = "smoother.verbose";

fn parse<V: FromStr>(options: &SolverOptions, key: &str) -> Result<V, SolverError> {
    options
        .get(key)
        .map_err(|err| SolverError::configuration(err.to_string(), options))
}

fn parse_real<T: Real>(options: &SolverOptions, key: &str) -> Result<T, SolverError> {
    options
        .get_real(key)
        .map_err(|err| SolverError::configuration(err.to_string(), options))
}

fn amg_settings<T: Real>(options: &SolverOptions) -> Result<AmgSettings<T>, SolverError> {
    Ok(AmgSettings {
        smoother_iterations: parse(options, SMOOTHER_ITERATIONS)?,
        smoother_relaxation: parse_real(options, SMOOTHER_RELAXATION)?,
        max_level: parse(options, MAX_LEVEL)?,
        coarse_target: parse(options, COARSE_TARGET)?,
        min_coarse_rate: parse_real(options, MIN_COARSE_RATE)?,
        prolongation_damping: parse_real(options, PROLONG_DAMP)?,
        anisotropy_dim: parse(options, ANISOTROPY_DIM)?,
        verbose: parse::<u32>(options, SMOOTHER_VERBOSE)? > 0,
    })
}

impl<T: Real> SolverBackend<T> for NativeSparseMatrix<T> {
    fn solver_types() -> &'static [&'static str] {
        TYPES
    }

    fn default_solver_options(solver_type: &str) -> Option<SolverOptions> {
        let mut options = base_options(solver_type, false);
        options
            .set(MAX_ITER, "10000")
            .set(PRECISION, "1e-10")
            .set(VERBOSE, "0");
        match solver_type {
            "bicgstab.ilut" => {
                options
                    .set(ILU_LEVEL, "2")
                    .set(ILU_RELAXATION, "1.0");
            }
            "bicgstab.amg.ilu0" => {
                options
                    .set(SMOOTHER_ITERATIONS, "1")
                    .set(SMOOTHER_RELAXATION, "1")
                    .set(MAX_LEVEL, "15")
                    .set(COARSE_TARGET, "2000")
                    .set(MIN_COARSE_RATE, "1.2")
                    .set(PROLONG_DAMP, "1.6")
                    .set(ANISOTROPY_DIM, "2")
                    .set(SMOOTHER_VERBOSE, "0");
            }
            _ => return None,
        }
        Some(options)
    }

    fn requires_symmetry(_solver_type: &str) -> bool {
        false
    }

    fn symmetry_defect(&self) -> T {
        self.view().symmetry_defect()
    }

    fn dispatch(
        &self,
        solver_type: &str,
        options: &SolverOptions,
        rhs: &NativeVector<T>,
        solution: &mut NativeVector<T>,
    ) -> Result<ComputationStatus, SolverError> {
        let view = self.view();
        if view.nrows() != view.ncols() {
            return Ok(ComputationStatus::InvalidInput);
        }
        let settings = krylov_settings(options)?;
        let verbose = parse::<u32>(options, VERBOSE)? > 0;
        let n = rhs.size();

        let b = DVectorView::from_slice(rhs.as_slice(), n);
        let x = DVectorViewMut::from_slice(solution.as_mut_slice(), n);
        let mut bicgstab = BiCgStab::new(settings);

        let result = match solver_type {
            "bicgstab.ilut" => {
                let level = parse(options, ILU_LEVEL)?;
                let relaxation = parse_real(options, ILU_RELAXATION)?;
                match IncompleteLu::level(&view, level) {
                    Ok(ilu) => bicgstab.solve_with_guess(&view, &ilu.with_relaxation(relaxation), b, x),
                    Err(err) => {
                        debug!("ILU({}) factorization failed: {}", level, err);
                        return Ok(ComputationStatus::NumericalIssue);
                    }
                }
            }
            "bicgstab.amg.ilu0" => match AggregationAmg::new(&view, amg_settings(options)?) {
                Ok(amg) => bicgstab.solve_with_guess(&view, &amg, b, x),
                Err(err) => {
                    debug!("AMG setup failed: {}", err);
                    return Ok(ComputationStatus::NumericalIssue);
                }
            },
            _ => {
                return Err(SolverError::configuration(
                    format!("unknown solver type '{}'", solver_type),
                    options,
                ))
            }
        };

        if verbose {
            match &result {
                Ok(output) => info!(
                    "'{}': {} iterations, relative residual {}",
                    solver_type, output.num_iterations, output.relative_residual
                ),
                Err(err) => info!("'{}': {}", solver_type, err),
            }
        }
        Ok(krylov_status(solver_type, result))
    }
}
