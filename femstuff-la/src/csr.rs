//! Row-major compressed storage of the native engine.
//!
//! Column indices are sorted within each row. The preconditioners and the factorizations that
//! nalgebra-sparse lacks read matrices through [`CsrView`], which also borrows the arrays of a
//! [`SparseMatrix`](crate::SparseMatrix).
use crate::error::{check_index, ContainerError};
use crate::Real;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;

/// Borrowed view of a CSR matrix.
#[derive(Debug, Copy, Clone)]
pub struct CsrView<'a, T> {
    nrows: usize,
    ncols: usize,
    row_offsets: &'a [usize],
    col_indices: &'a [usize],
    values: &'a [T],
}

impl<'a, T: Real> CsrView<'a, T> {
    pub fn from_csr_data(
        nrows: usize,
        ncols: usize,
        row_offsets: &'a [usize],
        col_indices: &'a [usize],
        values: &'a [T],
    ) -> Self {
        assert_eq!(row_offsets.len(), nrows + 1, "Offsets must have length nrows + 1.");
        assert_eq!(col_indices.len(), values.len());
        Self {
            nrows,
            ncols,
            row_offsets,
            col_indices,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_offsets(&self) -> &'a [usize] {
        self.row_offsets
    }

    pub fn col_indices(&self) -> &'a [usize] {
        self.col_indices
    }

    pub fn values(&self) -> &'a [T] {
        self.values
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&'a [usize], &'a [T]) {
        let range = self.row_offsets[i]..self.row_offsets[i + 1];
        (&self.col_indices[range.clone()], &self.values[range])
    }

    /// Position of entry `(i, j)` in the value array, if it is part of the pattern.
    pub fn position(&self, i: usize, j: usize) -> Option<usize> {
        find_in_row(self.row_offsets, self.col_indices, i, j)
    }

    /// Entry `(i, j)`, zero outside the pattern.
    pub fn get(&self, i: usize, j: usize) -> T {
        self.position(i, j)
            .map(|k| self.values[k])
            .unwrap_or_else(T::zero)
    }

    pub fn diagonal(&self) -> DVector<T> {
        DVector::from_fn(self.nrows.min(self.ncols), |i, _| self.get(i, i))
    }

    /// `y = A x`
    pub fn spmv(&self, y: &mut [T], x: &[T]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        for (i, y_i) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *y_i = cols
                .iter()
                .zip(vals)
                .fold(T::zero(), |acc, (&j, &a_ij)| acc + a_ij * x[j]);
        }
    }

    /// Iterator over `(row, col, value)` of all stored entries in row-major order.
    pub fn triplet_iter(&self) -> impl Iterator<Item = (usize, usize, T)> + 'a {
        let view = *self;
        (0..view.nrows).flat_map(move |i| {
            let (cols, vals) = view.row(i);
            cols.iter().zip(vals).map(move |(&j, &v)| (i, j, v))
        })
    }

    /// Largest absolute difference `|a_ij - a_ji|` over all stored entries.
    pub fn symmetry_defect(&self) -> T {
        self.triplet_iter()
            .map(|(i, j, v)| {
                let transposed = if j < self.nrows && i < self.ncols {
                    self.get(j, i)
                } else {
                    T::zero()
                };
                (v - transposed).abs()
            })
            .fold(T::zero(), |acc, d| if d > acc || !d.is_finite() { d } else { acc })
    }

    pub fn sup_norm(&self) -> T {
        self.values
            .iter()
            .fold(T::zero(), |acc, v| acc.max(v.abs()))
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for (i, j, v) in self.triplet_iter() {
            dense[(i, j)] += v;
        }
        dense
    }

    pub fn to_owned(&self) -> CsrData<T> {
        CsrData {
            nrows: self.nrows,
            ncols: self.ncols,
            row_offsets: self.row_offsets.to_vec(),
            col_indices: self.col_indices.to_vec(),
            values: self.values.to_vec(),
        }
    }
}

/// Owned CSR arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrData<T> {
    pub(crate) nrows: usize,
    pub(crate) ncols: usize,
    pub(crate) row_offsets: Vec<usize>,
    pub(crate) col_indices: Vec<usize>,
    pub(crate) values: Vec<T>,
}

impl<T: Real> CsrData<T> {
    /// Validates the arrays: offsets monotone, columns sorted without duplicates and in range.
    pub fn try_from_csr_data(
        nrows: usize,
        ncols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, ContainerError> {
        let invalid = |message: &str| ContainerError::InvalidPattern {
            message: message.to_string(),
        };
        if row_offsets.len() != nrows + 1 {
            return Err(invalid("offset array must have length nrows + 1"));
        }
        if row_offsets[0] != 0 || row_offsets[nrows] != col_indices.len() {
            return Err(invalid("offsets must start at zero and end at the number of entries"));
        }
        if col_indices.len() != values.len() {
            return Err(invalid("column index and value arrays differ in length"));
        }
        for window in row_offsets.windows(2) {
            if window[0] > window[1] || window[1] > col_indices.len() {
                return Err(invalid("offsets must be monotonically increasing"));
            }
            let row = &col_indices[window[0]..window[1]];
            if row.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(invalid("column indices must be strictly increasing within a row"));
            }
            if let Some(&j) = row.last() {
                check_index(j, ncols)?;
            }
        }
        Ok(Self {
            nrows,
            ncols,
            row_offsets,
            col_indices,
            values,
        })
    }

    /// Assembles a matrix from rows of `(col, value)` maps.
    pub fn from_rows(ncols: usize, rows: Vec<BTreeMap<usize, T>>) -> Self {
        let nrows = rows.len();
        let mut row_offsets = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_offsets.push(0);
        for row in rows {
            for (j, v) in row {
                col_indices.push(j);
                values.push(v);
            }
            row_offsets.push(col_indices.len());
        }
        Self {
            nrows,
            ncols,
            row_offsets,
            col_indices,
            values,
        }
    }

    pub fn view(&self) -> CsrView<T> {
        CsrView::from_csr_data(
            self.nrows,
            self.ncols,
            &self.row_offsets,
            &self.col_indices,
            &self.values,
        )
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn csr_data_mut(&mut self) -> (&[usize], &[usize], &mut [T]) {
        (&self.row_offsets, &self.col_indices, &mut self.values)
    }
}

pub(crate) fn find_in_row(row_offsets: &[usize], col_indices: &[usize], i: usize, j: usize) -> Option<usize> {
    let begin = row_offsets[i];
    let end = row_offsets[i + 1];
    col_indices[begin..end]
        .binary_search(&j)
        .ok()
        .map(|k| begin + k)
}

/// Mutable access to an entry that must exist in the pattern.
pub(crate) fn entry_mut<'a, T>(
    (row_offsets, col_indices, values): (&[usize], &[usize], &'a mut [T]),
    nrows: usize,
    ncols: usize,
    i: usize,
    j: usize,
) -> Result<&'a mut T, ContainerError> {
    check_index(i, nrows)?;
    check_index(j, ncols)?;
    let k = find_in_row(row_offsets, col_indices, i, j).ok_or(ContainerError::NotInPattern { row: i, col: j })?;
    Ok(&mut values[k])
}

/// Checks that `(i, j)` is a legal entry without touching any storage.
pub(crate) fn check_entry(view: &CsrView<impl Real>, i: usize, j: usize) -> Result<(), ContainerError> {
    check_index(i, view.nrows())?;
    check_index(j, view.ncols())?;
    view.position(i, j)
        .map(|_| ())
        .ok_or(ContainerError::NotInPattern { row: i, col: j })
}

pub(crate) fn clear_row<T: Real>((row_offsets, _, values): (&[usize], &[usize], &mut [T]), i: usize) {
    values[row_offsets[i]..row_offsets[i + 1]]
        .iter_mut()
        .for_each(|v| *v = T::zero());
}

/// Sets the entries of column `j` to zero, except for the diagonal which is set to `diagonal` if
/// given.
pub(crate) fn clear_col<T: Real>(
    (row_offsets, col_indices, values): (&[usize], &[usize], &mut [T]),
    j: usize,
    diagonal: Option<T>,
) {
    let nrows = row_offsets.len() - 1;
    for i in 0..nrows {
        if let Some(k) = find_in_row(row_offsets, col_indices, i, j) {
            values[k] = match diagonal {
                Some(d) if i == j => d,
                _ => T::zero(),
            };
        }
    }
}

/// `self += alpha * x` for two matrices of equal shape. Every stored entry of `x` with a nonzero
/// value must be in the pattern of `self`; nothing is modified otherwise.
pub(crate) fn axpy<T: Real>(
    target: (&[usize], &[usize], &mut [T]),
    alpha: T,
    x: &CsrView<T>,
) -> Result<(), ContainerError> {
    let (row_offsets, col_indices, values) = target;
    if row_offsets == x.row_offsets() && col_indices == x.col_indices() {
        values
            .iter_mut()
            .zip(x.values())
            .for_each(|(v, &x_v)| *v += alpha * x_v);
        return Ok(());
    }

    let positions = x
        .triplet_iter()
        .filter(|(_, _, v)| *v != T::zero())
        .map(|(i, j, v)| {
            find_in_row(row_offsets, col_indices, i, j)
                .map(|k| (k, v))
                .ok_or(ContainerError::NotInPattern { row: i, col: j })
        })
        .collect::<Result<Vec<_>, _>>()?;
    for (k, v) in positions {
        values[k] += alpha * v;
    }
    Ok(())
}
