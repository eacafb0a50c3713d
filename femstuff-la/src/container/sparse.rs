//! Sparse matrix on top of nalgebra-sparse.
use crate::container::dense::DenseVector;
use crate::container::pattern::SparsityPattern;
use crate::container::{check_mv_shapes, ContainerInterface, MatrixInterface};
use crate::csr::CsrView;
use crate::error::{check_index, check_shape, ContainerError};
use crate::krylov::Triangle;
use crate::Real;
use nalgebra::DVector;
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::{CsrMatrix, SparseEntry, SparseEntryMut};
use std::sync::Arc;

/// CSR matrix with a fixed sparsity pattern, acting on [`DenseVector`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T: Real> {
    backend: Arc<CsrMatrix<T>>,
}

impl<T: Real> SparseMatrix<T> {
    /// Matrix with all pattern entries set to zero.
    pub fn new(rows: usize, cols: usize, pattern: &SparsityPattern) -> Result<Self, ContainerError> {
        check_shape((rows, cols), (pattern.rows(), cols))?;
        let (offsets, indices) = pattern.to_csr_indices(cols)?;
        let values = vec![T::zero(); indices.len()];
        let backend = CsrMatrix::try_from_csr_data(rows, cols, offsets, indices, values)
            .map_err(|err| ContainerError::InvalidPattern {
                message: err.to_string(),
            })?;
        Ok(Self::from_backend(backend))
    }

    /// Square matrix with a diagonal pattern, every diagonal entry set to `value`.
    pub fn from_diagonal_element(n: usize, value: T) -> Self {
        let mut matrix = CsrMatrix::identity(n);
        matrix.values_mut().iter_mut().for_each(|v| *v = value);
        Self::from_backend(matrix)
    }

    pub fn from_backend(backend: CsrMatrix<T>) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &CsrMatrix<T> {
        &self.backend
    }

    /// Mutable access to the backend. Detaches `self` from any clone sharing its storage.
    pub fn backend_mut(&mut self) -> &mut CsrMatrix<T> {
        Arc::make_mut(&mut self.backend)
    }

    /// Borrowed raw arrays, for the factorizations that work on plain CSR data.
    pub fn view(&self) -> CsrView<T> {
        let (offsets, indices, values) = self.backend.csr_data();
        CsrView::from_csr_data(self.backend.nrows(), self.backend.ncols(), offsets, indices, values)
    }

    pub fn nnz(&self) -> usize {
        self.backend.nnz()
    }

    /// Main diagonal, zero where it is not part of the pattern.
    pub fn diagonal(&self) -> DVector<T> {
        let n = self.backend.nrows().min(self.backend.ncols());
        DVector::from_fn(n, |i, _| self.get_entry(i, i))
    }

    /// The symmetric matrix defined by one triangle of `self`, diagonal included. Entries of the
    /// other triangle are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square.
    pub fn symmetric_part(&self, triangle: Triangle) -> CsrMatrix<T> {
        assert_eq!(self.rows(), self.cols(), "Symmetric part requires a square matrix.");
        let half = match triangle {
            Triangle::Lower => self.backend.lower_triangle(),
            Triangle::Upper => self.backend.upper_triangle(),
        };
        &(&half + &half.transpose()) - &half.diagonal_as_csr()
    }

    /// Checks that `(i, j)` is a legal entry without touching any storage.
    fn check_entry(&self, i: usize, j: usize) -> Result<(), ContainerError> {
        check_index(i, self.rows())?;
        check_index(j, self.cols())?;
        match self.backend.get_entry(i, j) {
            Some(SparseEntry::NonZero(_)) => Ok(()),
            _ => Err(ContainerError::NotInPattern { row: i, col: j }),
        }
    }

    /// Mutable access to an entry that must exist in the pattern.
    fn entry_mut(&mut self, i: usize, j: usize) -> Result<&mut T, ContainerError> {
        self.check_entry(i, j)?;
        match self.backend_mut().get_entry_mut(i, j) {
            Some(SparseEntryMut::NonZero(value)) => Ok(value),
            _ => Err(ContainerError::NotInPattern { row: i, col: j }),
        }
    }

    /// Sets the stored entries of column `j` to zero, except for the diagonal which is set to
    /// `diagonal` if given.
    fn fill_col(&mut self, j: usize, diagonal: Option<T>) {
        for (i, mut row) in self.backend_mut().row_iter_mut().enumerate() {
            if let Some(SparseEntryMut::NonZero(value)) = row.get_entry_mut(j) {
                *value = match diagonal {
                    Some(d) if i == j => d,
                    _ => T::zero(),
                };
            }
        }
    }
}

impl<T: Real> ContainerInterface<T> for SparseMatrix<T> {
    fn copy(&self) -> Self {
        Self::from_backend(self.backend().clone())
    }

    fn shape(&self) -> (usize, usize) {
        (self.backend.nrows(), self.backend.ncols())
    }

    fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }

    fn scal(&mut self, alpha: T) {
        self.backend_mut()
            .values_mut()
            .iter_mut()
            .for_each(|v| *v *= alpha);
    }

    fn axpy(&mut self, alpha: T, x: &Self) -> Result<(), ContainerError> {
        check_shape(self.shape(), x.shape())?;
        if self.backend.pattern() == x.backend.pattern() {
            self.backend_mut()
                .values_mut()
                .iter_mut()
                .zip(x.backend.values())
                .for_each(|(v, &x_v)| *v += alpha * x_v);
            return Ok(());
        }

        // Every nonzero of `x` is checked before the storage is detached.
        let updates = x
            .backend
            .triplet_iter()
            .filter(|(_, _, v)| **v != T::zero())
            .map(|(i, j, &v)| self.check_entry(i, j).map(|_| (i, j, v)))
            .collect::<Result<Vec<_>, _>>()?;
        for (i, j, v) in updates {
            *self.entry_mut(i, j)? += alpha * v;
        }
        Ok(())
    }
}

impl<T: Real> MatrixInterface<T> for SparseMatrix<T> {
    type Vector = DenseVector<T>;

    fn rows(&self) -> usize {
        self.backend.nrows()
    }

    fn cols(&self) -> usize {
        self.backend.ncols()
    }

    fn mv(&self, x: &DenseVector<T>, y: &mut DenseVector<T>) -> Result<(), ContainerError> {
        check_mv_shapes(self.shape(), x.shape(), y.shape())?;
        spmm_csr_dense(
            T::zero(),
            y.backend_mut(),
            T::one(),
            Op::NoOp(self.backend()),
            Op::NoOp(x.backend()),
        );
        Ok(())
    }

    fn get_entry(&self, i: usize, j: usize) -> T {
        self.backend
            .get_entry(i, j)
            .map(SparseEntry::into_value)
            .unwrap_or_else(|| panic!("Entry ({}, {}) out of range.", i, j))
    }

    fn set_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError> {
        *self.entry_mut(i, j)? = value;
        Ok(())
    }

    fn add_to_entry(&mut self, i: usize, j: usize, value: T) -> Result<(), ContainerError> {
        *self.entry_mut(i, j)? += value;
        Ok(())
    }

    fn clear_row(&mut self, i: usize) -> Result<(), ContainerError> {
        check_index(i, self.rows())?;
        self.backend_mut()
            .row_mut(i)
            .values_mut()
            .iter_mut()
            .for_each(|v| *v = T::zero());
        Ok(())
    }

    fn clear_col(&mut self, j: usize) -> Result<(), ContainerError> {
        check_index(j, self.cols())?;
        self.fill_col(j, None);
        Ok(())
    }

    fn unit_row(&mut self, i: usize) -> Result<(), ContainerError> {
        self.check_entry(i, i)?;
        self.clear_row(i)?;
        *self.entry_mut(i, i)? = T::one();
        Ok(())
    }

    fn unit_col(&mut self, j: usize) -> Result<(), ContainerError> {
        self.check_entry(j, j)?;
        self.fill_col(j, Some(T::one()));
        Ok(())
    }

    fn sup_norm(&self) -> T {
        self.backend
            .values()
            .iter()
            .fold(T::zero(), |acc, v| acc.max(v.abs()))
    }
}
