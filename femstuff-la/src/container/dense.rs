//! Dense containers on top of nalgebra.
use crate::container::{check_mv_shapes, ContainerInterface, MatrixInterface, VectorInterface};
use crate::error::{check_index, check_shape, ContainerError};
use crate::Real;
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct DenseVector<T: Real> {
    backend: Arc<DVector<T>>,
}

impl<T: Real> DenseVector<T> {
    pub fn from_element(size: usize, value: T) -> Self {
        Self::from_backend(DVector::from_element(size, value))
    }

    pub fn from_backend(backend: DVector<T>) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &DVector<T> {
        &self.backend
    }

    /// Mutable access to the backend. Detaches `self` from any clone sharing its storage.
    pub fn backend_mut(&mut self) -> &mut DVector<T> {
        Arc::make_mut(&mut self.backend)
    }

    pub fn into_backend(self) -> DVector<T> {
        Arc::try_unwrap(self.backend).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T: Real> From<DVector<T>> for DenseVector<T> {
    fn from(backend: DVector<T>) -> Self {
        Self::from_backend(backend)
    }
}

impl<T: Real> ContainerInterface<T> for DenseVector<T> {
    fn copy(&self) -> Self {
        Self::from_backend(self.backend().clone())
    }

    fn shape(&self) -> (usize, usize) {
        (self.backend.len(), 1)
    }

    fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }

    fn scal(&mut self, alpha: T) {
        *self.backend_mut() *= alpha;
    }

    fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), ContainerError> {
        check_shape(self.shape(), x.shape())?;
        self.backend_mut().axpy(alpha, x.backend(), T::one());
        Ok(())
    }
}

impl<T: Real> VectorInterface<T> for DenseVector<T> {
    fn zeros(size: usize) -> Self {
        Self::from_backend(DVector::zeros(size))
    }

    fn from_slice(values: &[T]) -> Self {
        Self::from_backend(DVector::from_column_slice(values))
    }

    fn as_slice(&self) -> &[T] {
        self.backend.as_slice()
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self.backend_mut().as_mut_slice()
    }

    fn dot(&self, other: &Self) -> Result<T, ContainerError> {
        check_shape(self.shape(), other.shape())?;
        Ok(self.backend.dot(other.backend()))
    }

    fn l1_norm(&self) -> T {
        self.backend.lp_norm(1)
    }

    fn l2_norm(&self) -> T {
        self.backend.norm()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T: Real> {
    backend: Arc<DMatrix<T>>,
}

impl<T: Real> DenseMatrix<T> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_backend(DMatrix::zeros(rows, cols))
    }

    pub fn from_element(rows: usize, cols: usize, value: T) -> Self {
        Self::from_backend(DMatrix::from_element(rows, cols, value))
    }

    pub fn from_backend(backend: DMatrix<T>) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &DMatrix<T> {
        &self.backend
    }

    /// Mutable access to the backend. Detaches `self` from any clone sharing its storage.
    pub fn backend_mut(&mut self) -> &mut DMatrix<T> {
        Arc::make_mut(&mut self.backend)
    }

    fn check_diagonal(&self, index: usize) -> Result<(), ContainerError> {
        check_index(index, self.rows())?;
        check_index(index, self.cols())
    }
}

impl<T: Real> From<DMatrix<T>> for DenseMatrix<T> {
    fn from(backend: DMatrix<T>) -> Self {
        Self::from_backend(backend)
    }
}

impl<T: Real> ContainerInterface<T> for DenseMatrix<T> {
    fn copy(&self) -> Self {
        Self::from_backend(self.backend().clone())
    }

    fn shape(&self) -> (usize, usize) {
        self.backend.shape()
    }

    fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }

    fn scal(&mut self, alpha: T) {
        *self.backend_mut() *= alpha;
    }

    fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), ContainerError> {
        check_shape(self.shape(), x.shape())?;
        self.backend_mut()
            .zip_apply(x.backend(), |a, x| *a += alpha * x);
        Ok(())
    }
}

impl<T: Real> MatrixInterface<T> for DenseMatrix<T> {
    type Vector = DenseVector<T>;

    fn rows(&self) -> usize {
        self.backend.nrows()
    }

    fn cols(&self) -> usize {
        self.backend.ncols()
    }

    fn mv(&self, x: &DenseVector<T>, y: &mut DenseVector<T>) -> Result<(), ContainerError> {
        check_mv_shapes(self.shape(), x.shape(), y.shape())?;
        y.backend_mut()
            .gemv(T::one(), self.backend(), x.backend(), T::zero());
        Ok(())
    }

    fn get_entry(&self, i: usize, j: usize) -> T {
        self.backend[(i, j)]
    }

    fn set_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError> {
        check_index(i, self.rows())?;
        check_index(j, self.cols())?;
        self.backend_mut()[(i, j)] = value;
        Ok(())
    }

    fn add_to_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError> {
        check_index(i, self.rows())?;
        check_index(j, self.cols())?;
        self.backend_mut()[(i, j)] += value;
        Ok(())
    }

    fn clear_row(&mut self, i: usize) -> Result<(), ContainerError> {
        check_index(i, self.rows())?;
        self.backend_mut().row_mut(i).fill(T::zero());
        Ok(())
    }

    fn clear_col(&mut self, j: usize) -> Result<(), ContainerError> {
        check_index(j, self.cols())?;
        self.backend_mut().column_mut(j).fill(T::zero());
        Ok(())
    }

    fn unit_row(&mut self, i: usize) -> Result<(), ContainerError> {
        self.check_diagonal(i)?;
        let backend = self.backend_mut();
        backend.row_mut(i).fill(T::zero());
        backend[(i, i)] = T::one();
        Ok(())
    }

    fn unit_col(&mut self, j: usize) -> Result<(), ContainerError> {
        self.check_diagonal(j)?;
        let backend = self.backend_mut();
        backend.column_mut(j).fill(T::zero());
        backend[(j, j)] = T::one();
        Ok(())
    }

    fn sup_norm(&self) -> T {
        self.backend.amax()
    }
}
