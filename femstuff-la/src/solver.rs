//! Named solver configurations and dispatch.
//!
//! Every matrix type registers its algorithms through [`SolverBackend`]. [`Solver`] validates the
//! requested configuration, layers it over the defaults of the selected algorithm, runs the
//! optional symmetry pre-check, dispatches, and finally verifies that the computed solution
//! actually solves the system before handing it out.
use crate::container::{ContainerInterface, MatrixInterface, VectorInterface};
use crate::error::{check_shape, ContainerError};
use crate::Real;
use core::fmt;
use log::{debug, warn};
use std::error::Error;
use std::marker::PhantomData;

mod dense;
mod native;
pub mod options;
mod sparse;

pub use options::{OptionError, SolverOptions};

/// Outcome reported by an algorithm.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ComputationStatus {
    Success,
    NumericalIssue,
    NoConvergence,
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SolverError {
    /// Unknown solver type, missing `type` key or unparsable option value.
    Configuration { message: String, options: SolverOptions },
    /// The matrix does not meet the requirements of the algorithm, e.g. symmetry.
    MatrixRequirement { message: String, options: SolverOptions },
    NumericalIssue { options: SolverOptions },
    NoConvergence { options: SolverOptions },
    InvalidInput { options: SolverOptions },
    /// The algorithm reported success, but `‖A x - b‖∞` exceeds the threshold.
    SolutionDoesNotSolveSystem {
        residual: f64,
        threshold: f64,
        options: SolverOptions,
    },
    Container(ContainerError),
}

impl SolverError {
    pub(crate) fn configuration(message: impl Into<String>, options: &SolverOptions) -> Self {
        Self::Configuration {
            message: message.into(),
            options: options.clone(),
        }
    }

    /// The options bundle the failing solve ran with, if any.
    pub fn options(&self) -> Option<&SolverOptions> {
        match self {
            Self::Configuration { options, .. }
            | Self::MatrixRequirement { options, .. }
            | Self::NumericalIssue { options }
            | Self::NoConvergence { options }
            | Self::InvalidInput { options }
            | Self::SolutionDoesNotSolveSystem { options, .. } => Some(options),
            Self::Container(_) => None,
        }
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { message, .. } => write!(f, "solver not set up correctly: {}", message)?,
            Self::MatrixRequirement { message, .. } => {
                write!(f, "matrix did not fulfill requirements: {}", message)?
            }
            Self::NumericalIssue { .. } => write!(
                f,
                "matrix did not fulfill requirements: the algorithm reported a numerical issue"
            )?,
            Self::NoConvergence { .. } => write!(f, "solver did not converge")?,
            Self::InvalidInput { .. } => write!(f, "solver rejected its input")?,
            Self::SolutionDoesNotSolveSystem {
                residual, threshold, ..
            } => write!(
                f,
                "computed solution does not solve the system: sup norm of the residual is {:e} > {:e}",
                residual, threshold
            )?,
            Self::Container(err) => return write!(f, "{}", err),
        }
        if let Some(options) = self.options() {
            write!(f, "\nThe following options were used:\n{}", options)?;
        }
        Ok(())
    }
}

impl Error for SolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Container(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ContainerError> for SolverError {
    fn from(err: ContainerError) -> Self {
        Self::Container(err)
    }
}

/// Largest absolute value, where any non-finite value wins over every finite one.
pub(crate) fn largest_defect<'a, T: Real + 'a>(values: impl IntoIterator<Item = &'a T>) -> T {
    values.into_iter().fold(T::zero(), |acc, v| {
        let d = v.abs();
        if acc.is_finite() && (d > acc || !d.is_finite()) {
            d
        } else {
            acc
        }
    })
}

pub(crate) fn to_f64<T: Real>(value: T) -> f64 {
    nalgebra::try_convert(value).unwrap_or(f64::NAN)
}

/// Catalogue of the algorithms available for a matrix type.
pub trait SolverBackend<T: Real>: MatrixInterface<T> {
    /// Algorithm names, the default first.
    fn solver_types() -> &'static [&'static str];

    /// Default options of `solver_type`, `None` if the type is unknown.
    fn default_solver_options(solver_type: &str) -> Option<SolverOptions>;

    /// Whether `solver_type` only accepts symmetric matrices.
    fn requires_symmetry(solver_type: &str) -> bool;

    /// `max |a_ij - a_ji|`
    fn symmetry_defect(&self) -> T;

    /// Runs `solver_type` with fully populated `options`. Errors are reserved for options that
    /// cannot be interpreted; numerical outcomes are reported through the status.
    fn dispatch(
        &self,
        solver_type: &str,
        options: &SolverOptions,
        rhs: &Self::Vector,
        solution: &mut Self::Vector,
    ) -> Result<ComputationStatus, SolverError>;
}

/// Options shared by every algorithm: the type and the residual post-check, plus the symmetry
/// pre-check for symmetric-only algorithms.
pub(crate) fn base_options(solver_type: &str, symmetric: bool) -> SolverOptions {
    let mut options = SolverOptions::with_type(solver_type);
    options.set(options::POST_CHECK_SOLVES_SYSTEM, "1e-5");
    if symmetric {
        options.set(options::PRE_CHECK_SYMMETRY, "1e-8");
    }
    options
}

/// Checks `‖A x - b‖∞ <= threshold`. Non-finite residuals are always rejected.
pub fn check_solves_system<T, M>(
    matrix: &M,
    rhs: &M::Vector,
    solution: &M::Vector,
    threshold: T,
    options: &SolverOptions,
) -> Result<(), SolverError>
where
    T: Real,
    M: MatrixInterface<T>,
{
    let mut residual = rhs.copy();
    matrix.mv(solution, &mut residual)?;
    residual.axpy(-T::one(), rhs)?;
    let sup_norm = residual.sup_norm();
    if sup_norm > threshold || !sup_norm.is_finite() {
        warn!(
            "Rejecting solution: sup norm of the residual is {} (threshold {}).",
            sup_norm, threshold
        );
        return Err(SolverError::SolutionDoesNotSolveSystem {
            residual: to_f64(sup_norm),
            threshold: to_f64(threshold),
            options: options.clone(),
        });
    }
    Ok(())
}

/// Front-end solving `A x = b` for a borrowed matrix.
#[derive(Debug)]
pub struct Solver<'a, T, M> {
    matrix: &'a M,
    marker: PhantomData<T>,
}

impl<'a, T, M> Solver<'a, T, M>
where
    T: Real,
    M: SolverBackend<T>,
{
    pub fn new(matrix: &'a M) -> Self {
        Self {
            matrix,
            marker: PhantomData,
        }
    }

    pub fn matrix(&self) -> &M {
        self.matrix
    }

    /// Available algorithm names, the default first.
    pub fn types(&self) -> &'static [&'static str] {
        M::solver_types()
    }

    /// The complete default option bundle of `solver_type`.
    pub fn options(&self, solver_type: &str) -> Result<SolverOptions, SolverError> {
        M::default_solver_options(solver_type)
            .ok_or_else(|| self.unknown_type(solver_type, &SolverOptions::with_type(solver_type)))
    }

    fn unknown_type(&self, solver_type: &str, options: &SolverOptions) -> SolverError {
        SolverError::configuration(
            format!(
                "unknown solver type '{}', available types are: {}",
                solver_type,
                self.types().join(", ")
            ),
            options,
        )
    }

    /// Solves with the default algorithm.
    pub fn apply(&self, rhs: &M::Vector, solution: &mut M::Vector) -> Result<(), SolverError> {
        let default_type = self
            .types()
            .first()
            .ok_or_else(|| SolverError::configuration("no solver types registered", &SolverOptions::new()))?;
        self.apply_type(rhs, solution, default_type)
    }

    /// Solves with the default options of `solver_type`.
    pub fn apply_type(&self, rhs: &M::Vector, solution: &mut M::Vector, solver_type: &str) -> Result<(), SolverError> {
        let options = self.options(solver_type)?;
        self.apply_options(rhs, solution, &options)
    }

    /// Solves with `options` layered over the defaults of the type they select.
    ///
    /// `solution` is only written when the solve succeeded and passed all checks.
    pub fn apply_options(
        &self,
        rhs: &M::Vector,
        solution: &mut M::Vector,
        options: &SolverOptions,
    ) -> Result<(), SolverError> {
        let solver_type = options
            .solver_type()
            .ok_or_else(|| SolverError::configuration("options need to have the key 'type' set", options))?;
        let defaults = M::default_solver_options(solver_type).ok_or_else(|| self.unknown_type(solver_type, options))?;
        let options = options.merged_with_defaults(&defaults);

        check_shape((self.matrix.rows(), 1), rhs.shape())?;
        check_shape((self.matrix.cols(), 1), solution.shape())?;

        if M::requires_symmetry(solver_type) {
            let threshold: T = options
                .get_real(options::PRE_CHECK_SYMMETRY)
                .map_err(|err| SolverError::configuration(err.to_string(), &options))?;
            if threshold > T::zero() {
                if self.matrix.rows() != self.matrix.cols() {
                    return Err(SolverError::MatrixRequirement {
                        message: format!(
                            "'{}' requires a square symmetric matrix, got {}x{}",
                            solver_type,
                            self.matrix.rows(),
                            self.matrix.cols()
                        ),
                        options,
                    });
                }
                let defect = self.matrix.symmetry_defect();
                if defect > threshold || !defect.is_finite() {
                    warn!("Matrix is not symmetric (defect {}), refusing '{}'.", defect, solver_type);
                    return Err(SolverError::MatrixRequirement {
                        message: format!(
                            "'{}' requires a symmetric matrix, but max |a_ij - a_ji| = {:e} > {:e}",
                            solver_type,
                            to_f64(defect),
                            to_f64(threshold)
                        ),
                        options,
                    });
                }
            }
        }

        debug!("Solving {}x{} system with '{}'.", self.matrix.rows(), self.matrix.cols(), solver_type);
        let mut candidate = M::Vector::zeros(self.matrix.cols());
        let status = self
            .matrix
            .dispatch(solver_type, &options, rhs, &mut candidate)?;
        match status {
            ComputationStatus::Success => {}
            ComputationStatus::NumericalIssue => {
                warn!("'{}' reported a numerical issue.", solver_type);
                return Err(SolverError::NumericalIssue { options });
            }
            ComputationStatus::NoConvergence => {
                warn!("'{}' did not converge.", solver_type);
                return Err(SolverError::NoConvergence { options });
            }
            ComputationStatus::InvalidInput => {
                warn!("'{}' rejected its input.", solver_type);
                return Err(SolverError::InvalidInput { options });
            }
        }

        let threshold: T = options
            .get_real(options::POST_CHECK_SOLVES_SYSTEM)
            .map_err(|err| SolverError::configuration(err.to_string(), &options))?;
        if threshold > T::zero() {
            check_solves_system(self.matrix, rhs, &candidate, threshold, &options)?;
        }

        *solution = candidate;
        Ok(())
    }
}
