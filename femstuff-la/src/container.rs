//! Uniform vector and matrix interfaces over the container backends.
//!
//! Containers hold their backend storage behind an [`Arc`](std::sync::Arc). Cloning a container
//! shares the storage, and every mutating call first makes the storage unique, so clones behave
//! like independent values. Use [`ContainerInterface::copy`] to force a deep copy.
use crate::error::{check_shape, ContainerError};
use crate::Real;
use std::fmt::Debug;

pub mod dense;
pub mod native;
pub mod pattern;
pub mod sparse;

/// Operations shared by vectors and matrices.
pub trait ContainerInterface<T: Real>: Clone + Debug {
    /// Deep copy that does not share storage with `self`.
    fn copy(&self) -> Self;

    /// `(rows, cols)`, vectors report `(size, 1)`.
    fn shape(&self) -> (usize, usize);

    /// Whether `self` and `other` currently share their backend storage.
    fn shares_storage_with(&self, other: &Self) -> bool;

    /// `self *= alpha`
    fn scal(&mut self, alpha: T);

    /// `self += alpha * x`
    fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), ContainerError>;

    fn has_equal_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }
}

pub trait VectorInterface<T: Real>: ContainerInterface<T> {
    fn zeros(size: usize) -> Self;

    fn from_slice(values: &[T]) -> Self;

    /// Read access to the contiguous entries.
    fn as_slice(&self) -> &[T];

    /// Write access to the contiguous entries. Makes the storage unique.
    fn as_mut_slice(&mut self) -> &mut [T];

    fn size(&self) -> usize {
        self.as_slice().len()
    }

    /// # Panics
    ///
    /// Panics if `i` is out of range.
    fn get_entry(&self, i: usize) -> T {
        assert!(i < self.size(), "Index {} out of range for vector of size {}.", i, self.size());
        self.as_slice()[i]
    }

    /// # Panics
    ///
    /// Panics if `i` is out of range.
    fn set_entry(&mut self, i: usize, value: T) {
        assert!(i < self.size(), "Index {} out of range for vector of size {}.", i, self.size());
        self.as_mut_slice()[i] = value;
    }

    /// # Panics
    ///
    /// Panics if `i` is out of range.
    fn add_to_entry(&mut self, i: usize, value: T) {
        assert!(i < self.size(), "Index {} out of range for vector of size {}.", i, self.size());
        self.as_mut_slice()[i] += value;
    }

    fn dot(&self, other: &Self) -> Result<T, ContainerError> {
        check_shape(self.shape(), other.shape())?;
        Ok(self
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .fold(T::zero(), |acc, (&a, &b)| acc + a * b))
    }

    fn l1_norm(&self) -> T {
        self.as_slice()
            .iter()
            .fold(T::zero(), |acc, v| acc + v.abs())
    }

    fn l2_norm(&self) -> T {
        self.as_slice()
            .iter()
            .fold(T::zero(), |acc, &v| acc + v * v)
            .sqrt()
    }

    fn sup_norm(&self) -> T {
        self.amax().1
    }

    /// Index and absolute value of the entry with the largest magnitude. Ties resolve to the
    /// smallest index; an empty vector yields `(0, 0)`.
    fn amax(&self) -> (usize, T) {
        let mut best = (0, T::zero());
        for (i, v) in self.as_slice().iter().enumerate() {
            let magnitude = v.abs();
            if magnitude > best.1 || (!magnitude.is_finite() && best.1.is_finite()) {
                best = (i, magnitude);
            }
        }
        best
    }

    /// Entry-wise comparison with the relative tolerance `epsilon`:
    /// `|a - b| <= epsilon * max(|a|, |b|)`. Shapes must match.
    fn almost_equal(&self, other: &Self, epsilon: T) -> bool {
        self.has_equal_shape(other)
            && self
                .as_slice()
                .iter()
                .zip(other.as_slice())
                .all(|(&a, &b)| a == b || (a - b).abs() <= epsilon * a.abs().max(b.abs()))
    }

    /// `self + other` as a new vector.
    fn add(&self, other: &Self) -> Result<Self, ContainerError> {
        let mut result = self.copy();
        result.iadd(other)?;
        Ok(result)
    }

    /// `self - other` as a new vector.
    fn sub(&self, other: &Self) -> Result<Self, ContainerError> {
        let mut result = self.copy();
        result.isub(other)?;
        Ok(result)
    }

    fn iadd(&mut self, other: &Self) -> Result<(), ContainerError> {
        self.axpy(T::one(), other)
    }

    fn isub(&mut self, other: &Self) -> Result<(), ContainerError> {
        self.axpy(-T::one(), other)
    }
}

pub trait MatrixInterface<T: Real>: ContainerInterface<T> {
    /// Vector type the matrix acts on.
    type Vector: VectorInterface<T>;

    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    /// `y = A x`
    fn mv(&self, x: &Self::Vector, y: &mut Self::Vector) -> Result<(), ContainerError>;

    /// Entry `(i, j)`. Sparse matrices return zero outside the pattern.
    ///
    /// # Panics
    ///
    /// Panics if `(i, j)` is out of range.
    fn get_entry(&self, i: usize, j: usize) -> T;

    fn set_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError>;

    fn add_to_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError>;

    fn clear_row(&mut self, i: usize) -> Result<(), ContainerError>;

    fn clear_col(&mut self, j: usize) -> Result<(), ContainerError>;

    /// Zeroes row `i` and puts a one on its diagonal.
    fn unit_row(&mut self, i: usize) -> Result<(), ContainerError>;

    /// Zeroes column `j` and puts a one on its diagonal.
    fn unit_col(&mut self, j: usize) -> Result<(), ContainerError>;

    /// Largest absolute entry.
    fn sup_norm(&self) -> T;
}

/// Shape checks shared by the `mv` implementations.
pub(crate) fn check_mv_shapes(
    matrix: (usize, usize),
    x: (usize, usize),
    y: (usize, usize),
) -> Result<(), ContainerError> {
    check_shape((matrix.1, 1), x)?;
    check_shape((matrix.0, 1), y)
}
