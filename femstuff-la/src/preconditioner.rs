//! Preconditioners usable as [`LinearOperator`]s in the Krylov methods.
use crate::csr::CsrView;
use crate::krylov::LinearOperator;
use crate::Real;
use core::fmt;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::error::Error;

mod amg;
mod ilu;

pub use amg::{AggregationAmg, AmgSettings};
pub use ilu::{IluDropRule, IncompleteLu};

/// Failure while setting up a preconditioner.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PreconditionerError {
    NonSquare { rows: usize, cols: usize },
    /// Row `row` has no nonzero entry, so the factorization cannot be scaled.
    ZeroRow { row: usize },
    /// The pivot of row `row` vanished in a factorization that does not drop entries.
    ZeroPivot { row: usize },
    /// The coarsest multigrid level could not be factored.
    SingularCoarseMatrix { size: usize },
}

impl fmt::Display for PreconditionerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonSquare { rows, cols } => {
                write!(f, "preconditioner requires a square matrix, got {}x{}", rows, cols)
            }
            Self::ZeroRow { row } => write!(f, "row {} of the matrix is zero", row),
            Self::ZeroPivot { row } => write!(f, "zero pivot in row {}", row),
            Self::SingularCoarseMatrix { size } => {
                write!(f, "coarse matrix of size {} is singular", size)
            }
        }
    }
}

impl Error for PreconditionerError {}

pub(crate) fn check_square<T: Real>(matrix: &CsrView<T>) -> Result<(), PreconditionerError> {
    if matrix.nrows() == matrix.ncols() {
        Ok(())
    } else {
        Err(PreconditionerError::NonSquare {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        })
    }
}

/// Diagonal scaling by the inverse diagonal. Zero diagonal entries are treated as one.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobi<T: Real> {
    inverse_diagonal: DVector<T>,
}

impl<T: Real> Jacobi<T> {
    pub fn from_diagonal(diagonal: &DVector<T>) -> Self {
        let inverse_diagonal = diagonal.map(|d| if d == T::zero() { T::one() } else { T::one() / d });
        Self { inverse_diagonal }
    }

    pub fn from_csr(matrix: &CsrView<T>) -> Self {
        Self::from_diagonal(&matrix.diagonal())
    }
}

impl<T: Real> LinearOperator<T> for Jacobi<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        y.copy_from(&x);
        y.component_mul_assign(&self.inverse_diagonal);
    }
}
