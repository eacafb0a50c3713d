//! Self-contained row-major engine.
//!
//! Storage is plain `Vec`s and all kernels live in this crate, which keeps the layout under our
//! control for partitioned use.
use crate::container::pattern::SparsityPattern;
use crate::container::{check_mv_shapes, ContainerInterface, MatrixInterface, VectorInterface};
use crate::csr::{self, CsrData, CsrView};
use crate::error::{check_index, check_shape, ContainerError};
use crate::Real;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct NativeVector<T> {
    values: Arc<Vec<T>>,
}

impl<T: Real> NativeVector<T> {
    pub fn from_element(size: usize, value: T) -> Self {
        Self::from_vec(vec![value; size])
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        Arc::try_unwrap(self.values).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T: Real> ContainerInterface<T> for NativeVector<T> {
    fn copy(&self) -> Self {
        Self::from_vec(self.values.to_vec())
    }

    fn shape(&self) -> (usize, usize) {
        (self.values.len(), 1)
    }

    fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    fn scal(&mut self, alpha: T) {
        self.as_mut_slice().iter_mut().for_each(|v| *v *= alpha);
    }

    fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), ContainerError> {
        check_shape(self.shape(), x.shape())?;
        self.as_mut_slice()
            .iter_mut()
            .zip(x.as_slice())
            .for_each(|(v, &x_v)| *v += alpha * x_v);
        Ok(())
    }
}

impl<T: Real> VectorInterface<T> for NativeVector<T> {
    fn zeros(size: usize) -> Self {
        Self::from_element(size, T::zero())
    }

    fn from_slice(values: &[T]) -> Self {
        Self::from_vec(values.to_vec())
    }

    fn as_slice(&self) -> &[T] {
        &self.values
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        Arc::make_mut(&mut self.values).as_mut_slice()
    }
}

/// CSR matrix of the native engine, acting on [`NativeVector`].
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSparseMatrix<T> {
    storage: Arc<CsrData<T>>,
}

impl<T: Real> NativeSparseMatrix<T> {
    /// Matrix with all pattern entries set to zero.
    pub fn new(rows: usize, cols: usize, pattern: &SparsityPattern) -> Result<Self, ContainerError> {
        check_shape((rows, cols), (pattern.rows(), cols))?;
        let (offsets, indices) = pattern.to_csr_indices(cols)?;
        let values = vec![T::zero(); indices.len()];
        Ok(Self::from_csr_data(CsrData::try_from_csr_data(
            rows, cols, offsets, indices, values,
        )?))
    }

    pub fn from_csr_data(storage: CsrData<T>) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn view(&self) -> CsrView<T> {
        self.storage.view()
    }

    pub fn nnz(&self) -> usize {
        self.storage.values.len()
    }

    fn storage_mut(&mut self) -> &mut CsrData<T> {
        Arc::make_mut(&mut self.storage)
    }
}

impl<T: Real> ContainerInterface<T> for NativeSparseMatrix<T> {
    fn copy(&self) -> Self {
        Self::from_csr_data(CsrData::clone(&self.storage))
    }

    fn shape(&self) -> (usize, usize) {
        (self.storage.nrows, self.storage.ncols)
    }

    fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    fn scal(&mut self, alpha: T) {
        self.storage_mut()
            .values_mut()
            .iter_mut()
            .for_each(|v| *v *= alpha);
    }

    fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), ContainerError> {
        check_shape(self.shape(), x.shape())?;
        let view = self.view();
        let mut scratch = view.values().to_vec();
        csr::axpy(
            (view.row_offsets(), view.col_indices(), &mut scratch),
            alpha,
            &x.view(),
        )?;
        self.storage_mut().values = scratch;
        Ok(())
    }
}

impl<T: Real> MatrixInterface<T> for NativeSparseMatrix<T> {
    type Vector = NativeVector<T>;

    fn rows(&self) -> usize {
        self.storage.nrows
    }

    fn cols(&self) -> usize {
        self.storage.ncols
    }

    fn mv(&self, x: &NativeVector<T>, y: &mut NativeVector<T>) -> Result<(), ContainerError> {
        check_mv_shapes(self.shape(), x.shape(), y.shape())?;
        self.view().spmv(y.as_mut_slice(), x.as_slice());
        Ok(())
    }

    fn get_entry(&self, i: usize, j: usize) -> T {
        assert!(i < self.rows() && j < self.cols(), "Entry ({}, {}) out of range.", i, j);
        self.view().get(i, j)
    }

    fn set_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError> {
        csr::check_entry(&self.view(), i, j)?;
        let (rows, cols) = self.shape();
        *csr::entry_mut(self.storage_mut().csr_data_mut(), rows, cols, i, j)? = value;
        Ok(())
    }

    fn add_to_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError> {
        csr::check_entry(&self.view(), i, j)?;
        let (rows, cols) = self.shape();
        *csr::entry_mut(self.storage_mut().csr_data_mut(), rows, cols, i, j)? += value;
        Ok(())
    }

    fn clear_row(&mut self, i: usize) -> Result<(), ContainerError> {
        check_index(i, self.rows())?;
        csr::clear_row(self.storage_mut().csr_data_mut(), i);
        Ok(())
    }

    fn clear_col(&mut self, j: usize) -> Result<(), ContainerError> {
        check_index(j, self.cols())?;
        csr::clear_col(self.storage_mut().csr_data_mut(), j, None);
        Ok(())
    }

    fn unit_row(&mut self, i: usize) -> Result<(), ContainerError> {
        csr::check_entry(&self.view(), i, i)?;
        let (rows, cols) = self.shape();
        let storage = self.storage_mut();
        csr::clear_row(storage.csr_data_mut(), i);
        *csr::entry_mut(storage.csr_data_mut(), rows, cols, i, i)? = T::one();
        Ok(())
    }

    fn unit_col(&mut self, j: usize) -> Result<(), ContainerError> {
        csr::check_entry(&self.view(), j, j)?;
        csr::clear_col(self.storage_mut().csr_data_mut(), j, Some(T::one()));
        Ok(())
    }

    fn sup_norm(&self) -> T {
        self.view().sup_norm()
    }
}
