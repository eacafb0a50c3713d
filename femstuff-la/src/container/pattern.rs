use crate::error::{check_index, ContainerError};
use std::collections::BTreeSet;

/// Per-row sets of legal column indices of a sparse matrix.
///
/// The pattern is fixed once a matrix is built from it. Rows without any entry receive their
/// diagonal entry at that point, so every row of a square matrix built from a pattern is
/// non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparsityPattern {
    rows: Vec<BTreeSet<usize>>,
}

impl SparsityPattern {
    pub fn new(rows: usize) -> Self {
        Self {
            rows: vec![BTreeSet::new(); rows],
        }
    }

    /// Pattern of a tridiagonal `n x n` matrix.
    pub fn tridiagonal(n: usize) -> Self {
        let mut pattern = Self::new(n);
        for i in 0..n {
            for j in i.saturating_sub(1)..usize::min(i + 2, n) {
                pattern.rows[i].insert(j);
            }
        }
        pattern
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn insert(&mut self, row: usize, col: usize) -> Result<(), ContainerError> {
        check_index(row, self.rows())?;
        self.rows[row].insert(col);
        Ok(())
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows
            .get(row)
            .map(|cols| cols.contains(&col))
            .unwrap_or(false)
    }

    /// Sorted column indices of `row`.
    pub fn row(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[row].iter().copied()
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeSet::len).sum()
    }

    /// CSR offsets and column indices for a matrix with `cols` columns, with the diagonal added
    /// to empty rows.
    pub(crate) fn to_csr_indices(&self, cols: usize) -> Result<(Vec<usize>, Vec<usize>), ContainerError> {
        let mut offsets = Vec::with_capacity(self.rows() + 1);
        let mut indices = Vec::with_capacity(self.nnz());
        offsets.push(0);
        for (i, row) in self.rows.iter().enumerate() {
            if row.is_empty() {
                check_index(i, cols)?;
                indices.push(i);
            } else {
                for &j in row {
                    check_index(j, cols)?;
                    indices.push(j);
                }
            }
            offsets.push(indices.len());
        }
        Ok((offsets, indices))
    }
}
