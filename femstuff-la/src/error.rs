use std::error::Error;
use std::fmt;

/// Violated precondition of a container operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContainerError {
    /// Operand shapes are incompatible. Shapes are `(rows, cols)`, vectors report `(size, 1)`.
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    IndexOutOfRange {
        index: usize,
        bound: usize,
    },
    /// A sparse entry outside the fixed sparsity pattern was about to be written.
    NotInPattern {
        row: usize,
        col: usize,
    },
    InvalidPattern {
        message: String,
    },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, actual } => write!(
                f,
                "shape mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            Self::IndexOutOfRange { index, bound } => {
                write!(f, "index {} out of range (must be < {})", index, bound)
            }
            Self::NotInPattern { row, col } => {
                write!(f, "entry ({}, {}) is not in the sparsity pattern", row, col)
            }
            Self::InvalidPattern { message } => write!(f, "invalid sparsity pattern: {}", message),
        }
    }
}

impl Error for ContainerError {}

pub(crate) fn check_index(index: usize, bound: usize) -> Result<(), ContainerError> {
    if index < bound {
        Ok(())
    } else {
        Err(ContainerError::IndexOutOfRange { index, bound })
    }
}

pub(crate) fn check_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<(), ContainerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ContainerError::ShapeMismatch { expected, actual })
    }
}
