//! Direct factorizations that nalgebra-sparse does not provide.
//!
//! The `L D Lᵀ` factorizations only read the lower triangle of the matrix, so they can factor
//! symmetric indefinite matrices as long as no zero pivot occurs. [`SparseQr`] factors general
//! square matrices without forming them densely.
use crate::csr::CsrView;
use crate::Real;
use core::fmt;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::mem;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FactorizationError {
    NonSquare { rows: usize, cols: usize },
    /// The pivot of the given column vanished.
    ZeroPivot { column: usize },
}

impl fmt::Display for FactorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonSquare { rows, cols } => {
                write!(f, "factorization requires a square matrix, got {}x{}", rows, cols)
            }
            Self::ZeroPivot { column } => write!(f, "zero pivot in column {}", column),
        }
    }
}

impl Error for FactorizationError {}

fn check_pivot<T: Real>(pivot: T, column: usize) -> Result<(), FactorizationError> {
    if pivot == T::zero() || !pivot.is_finite() {
        Err(FactorizationError::ZeroPivot { column })
    } else {
        Ok(())
    }
}

/// Dense `L D Lᵀ` factorization.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLdlt<T: Real> {
    /// Unit lower triangular factor.
    l: DMatrix<T>,
    d: DVector<T>,
}

impl<T: Real> DenseLdlt<T> {
    pub fn factor(matrix: &DMatrix<T>) -> Result<Self, FactorizationError> {
        let (rows, cols) = matrix.shape();
        if rows != cols {
            return Err(FactorizationError::NonSquare { rows, cols });
        }
        let n = rows;
        let mut l = DMatrix::identity(n, n);
        let mut d = DVector::zeros(n);

        for j in 0..n {
            let mut d_j = matrix[(j, j)];
            for k in 0..j {
                d_j -= l[(j, k)] * l[(j, k)] * d[k];
            }
            check_pivot(d_j, j)?;
            d[j] = d_j;

            for i in j + 1..n {
                let mut l_ij = matrix[(i, j)];
                for k in 0..j {
                    l_ij -= l[(i, k)] * l[(j, k)] * d[k];
                }
                l[(i, j)] = l_ij / d_j;
            }
        }

        Ok(Self { l, d })
    }

    pub fn l(&self) -> &DMatrix<T> {
        &self.l
    }

    pub fn d(&self) -> &DVector<T> {
        &self.d
    }

    pub fn solve(&self, b: &DVector<T>) -> DVector<T> {
        let mut x = b.clone();
        self.solve_mut(&mut x);
        x
    }

    pub fn solve_mut(&self, x: &mut DVector<T>) {
        let n = self.d.len();
        assert_eq!(x.len(), n);
        for i in 0..n {
            for k in 0..i {
                x[i] = x[i] - self.l[(i, k)] * x[k];
            }
        }
        x.component_div_assign(&self.d);
        for i in (0..n).rev() {
            for k in i + 1..n {
                x[i] = x[i] - self.l[(k, i)] * x[k];
            }
        }
    }
}

/// Up-looking simplicial `L D Lᵀ` factorization of a sparse symmetric matrix, computed from
/// its elimination tree. The matrix is factored in its given ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplicialLdlt<T> {
    /// Column offsets of the strictly lower factor `L`.
    l_offsets: Vec<usize>,
    l_row_indices: Vec<usize>,
    l_values: Vec<T>,
    d: Vec<T>,
}

const NO_PARENT: usize = usize::MAX;

impl<T: Real> SimplicialLdlt<T> {
    pub fn factor(matrix: &CsrView<T>) -> Result<Self, FactorizationError> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        if rows != cols {
            return Err(FactorizationError::NonSquare { rows, cols });
        }
        let n = rows;

        // Symbolic phase: elimination tree and column counts of L
        let mut parent = vec![NO_PARENT; n];
        let mut flag = vec![0; n];
        let mut column_counts = vec![0; n];
        for k in 0..n {
            flag[k] = k;
            let (row_cols, _) = matrix.row(k);
            for &start in row_cols.iter().take_while(|&&i| i < k) {
                let mut i = start;
                while flag[i] != k {
                    if parent[i] == NO_PARENT {
                        parent[i] = k;
                    }
                    column_counts[i] += 1;
                    flag[i] = k;
                    i = parent[i];
                }
            }
        }
        let mut l_offsets = Vec::with_capacity(n + 1);
        l_offsets.push(0);
        for count in &column_counts {
            l_offsets.push(l_offsets.last().copied().unwrap_or(0) + count);
        }
        let nnz = l_offsets[n];

        // Numeric phase
        flag.fill(NO_PARENT);
        let mut l_row_indices = vec![0; nnz];
        let mut l_values = vec![T::zero(); nnz];
        let mut d = vec![T::zero(); n];
        let mut y = vec![T::zero(); n];
        let mut pattern = vec![0; n];
        let mut filled = vec![0; n];

        for k in 0..n {
            y[k] = T::zero();
            let mut top = n;
            flag[k] = k;
            let (row_cols, row_vals) = matrix.row(k);
            for (&start, &a_ki) in row_cols.iter().zip(row_vals).take_while(|&(&i, _)| i <= k) {
                y[start] += a_ki;
                let mut len = 0;
                let mut i = start;
                while flag[i] != k {
                    pattern[len] = i;
                    len += 1;
                    flag[i] = k;
                    i = parent[i];
                }
                while len > 0 {
                    top -= 1;
                    len -= 1;
                    pattern[top] = pattern[len];
                }
            }

            d[k] = y[k];
            y[k] = T::zero();
            for &i in &pattern[top..n] {
                let y_i = y[i];
                y[i] = T::zero();
                let end = l_offsets[i] + filled[i];
                for p in l_offsets[i]..end {
                    y[l_row_indices[p]] -= l_values[p] * y_i;
                }
                let l_ki = y_i / d[i];
                d[k] -= l_ki * y_i;
                l_row_indices[end] = k;
                l_values[end] = l_ki;
                filled[i] += 1;
            }
            check_pivot(d[k], k)?;
        }

        Ok(Self {
            l_offsets,
            l_row_indices,
            l_values,
            d,
        })
    }

    pub fn dim(&self) -> usize {
        self.d.len()
    }

    /// Number of stored off-diagonal entries of `L`.
    pub fn l_nnz(&self) -> usize {
        self.l_values.len()
    }

    pub fn solve(&self, b: &DVector<T>) -> DVector<T> {
        let mut x = b.clone();
        self.solve_in_place(x.as_mut_slice());
        x
    }

    pub fn solve_in_place(&self, x: &mut [T]) {
        let n = self.dim();
        assert_eq!(x.len(), n);
        let column = |j: usize| {
            let range = self.l_offsets[j]..self.l_offsets[j + 1];
            self.l_row_indices[range.clone()]
                .iter()
                .zip(&self.l_values[range])
        };
        for j in 0..n {
            let x_j = x[j];
            for (&i, &l_ij) in column(j) {
                x[i] -= l_ij * x_j;
            }
        }
        for (x_j, &d_j) in x.iter_mut().zip(&self.d) {
            *x_j /= d_j;
        }
        for j in (0..n).rev() {
            let sum = column(j).fold(T::zero(), |acc, (&i, &l_ij)| acc + l_ij * x[i]);
            x[j] -= sum;
        }
    }
}

/// Sparse QR factorization `A = Q R` by Givens rotations.
///
/// The rows of `A` are merged into `R` one at a time. A row whose leading column already has a
/// row in `R` is rotated against it until it either finds a free slot or vanishes. `Q` is only
/// kept as the sequence of rotations, which is replayed on the right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseQr<T> {
    /// Row `k` of `R`, sorted by column. The first entry is the diagonal.
    r_rows: Vec<Vec<(usize, T)>>,
    /// Rotations `(k, c, s)` applied to the input rows, concatenated.
    rotations: Vec<(usize, T, T)>,
    rotation_offsets: Vec<usize>,
    /// Row of `R` each input row ended up in. `None` if it was eliminated completely.
    placement: Vec<Option<usize>>,
}

impl<T: Real> SparseQr<T> {
    pub fn factor(matrix: &CsrView<T>) -> Result<Self, FactorizationError> {
        let (rows, cols) = (matrix.nrows(), matrix.ncols());
        if rows != cols {
            return Err(FactorizationError::NonSquare { rows, cols });
        }
        let n = rows;

        // An empty map is a free slot, taken rows always hold their nonzero diagonal.
        let mut r_rows: Vec<BTreeMap<usize, T>> = vec![BTreeMap::new(); n];
        let mut rotations = Vec::new();
        let mut rotation_offsets = Vec::with_capacity(n + 1);
        rotation_offsets.push(0);
        let mut placement = Vec::with_capacity(n);

        for i in 0..n {
            let (row_cols, row_vals) = matrix.row(i);
            let mut w: BTreeMap<usize, T> = row_cols
                .iter()
                .copied()
                .zip(row_vals.iter().copied())
                .filter(|&(_, v)| v != T::zero())
                .collect();
            let mut placed = None;

            loop {
                let (k, w_k) = match w.first_key_value() {
                    Some((&k, &w_k)) => (k, w_k),
                    None => break,
                };
                if r_rows[k].is_empty() {
                    r_rows[k] = mem::take(&mut w);
                    placed = Some(k);
                    break;
                }

                let r_k = &mut r_rows[k];
                let r_kk = r_k.get(&k).copied().unwrap_or_else(T::zero);
                let rho = r_kk.hypot(w_k);
                let (c, s) = (r_kk / rho, w_k / rho);
                let columns: BTreeSet<usize> = r_k.keys().chain(w.keys()).copied().collect();
                for j in columns {
                    let r_j = r_k.get(&j).copied().unwrap_or_else(T::zero);
                    let w_j = w.get(&j).copied().unwrap_or_else(T::zero);
                    let rotated_r = c * r_j + s * w_j;
                    let rotated_w = c * w_j - s * r_j;
                    if rotated_r == T::zero() {
                        r_k.remove(&j);
                    } else {
                        r_k.insert(j, rotated_r);
                    }
                    if j == k || rotated_w == T::zero() {
                        w.remove(&j);
                    } else {
                        w.insert(j, rotated_w);
                    }
                }
                rotations.push((k, c, s));
            }

            rotation_offsets.push(rotations.len());
            placement.push(placed);
        }

        for (k, row) in r_rows.iter().enumerate() {
            check_pivot(row.get(&k).copied().unwrap_or_else(T::zero), k)?;
        }

        Ok(Self {
            r_rows: r_rows
                .into_iter()
                .map(|row| row.into_iter().collect())
                .collect(),
            rotations,
            rotation_offsets,
            placement,
        })
    }

    pub fn dim(&self) -> usize {
        self.r_rows.len()
    }

    /// Number of stored entries of `R`, including the diagonal.
    pub fn r_nnz(&self) -> usize {
        self.r_rows.iter().map(Vec::len).sum()
    }

    pub fn solve(&self, b: &DVector<T>) -> DVector<T> {
        let mut x = b.clone();
        self.solve_in_place(x.as_mut_slice());
        x
    }

    pub fn solve_in_place(&self, x: &mut [T]) {
        let n = self.dim();
        assert_eq!(x.len(), n);

        // z = Qᵀ b
        let mut z = vec![T::zero(); n];
        for (i, &b_i) in x.iter().enumerate() {
            let mut beta = b_i;
            let range = self.rotation_offsets[i]..self.rotation_offsets[i + 1];
            for &(k, c, s) in &self.rotations[range] {
                let z_k = z[k];
                z[k] = c * z_k + s * beta;
                beta = c * beta - s * z_k;
            }
            if let Some(k) = self.placement[i] {
                z[k] = beta;
            }
        }

        for k in (0..n).rev() {
            let row = &self.r_rows[k];
            let sum = row[1..]
                .iter()
                .fold(T::zero(), |acc, &(j, r_kj)| acc + r_kj * z[j]);
            z[k] = (z[k] - sum) / row[0].1;
        }
        x.copy_from_slice(&z);
    }
}
