use crate::csr::CsrView;
use crate::krylov::LinearOperator;
use crate::preconditioner::{check_square, PreconditionerError};
use crate::Real;
use nalgebra::{DVectorView, DVectorViewMut};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Marks an index that is not part of the current working row.
const NOT_IN_ROW: usize = usize::MAX;

/// Decides which entries of the incomplete factors are kept.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum IluDropRule<T> {
    /// Dual threshold strategy (ILUT): entries smaller than `drop_tolerance` times the norm of
    /// the matrix row are dropped, and at most `fill_factor * nnz(A) / n + 1` entries are kept in
    /// each row of each factor.
    Threshold { drop_tolerance: T, fill_factor: usize },
    /// Level-of-fill strategy (ILU(k)). Original entries have level zero, fill created by
    /// entries of levels `a` and `b` has level `a + b + 1`, and fill above the given level is
    /// dropped. `Level(0)` keeps exactly the pattern of the matrix.
    Level(usize),
    /// Nothing is dropped, which gives the exact LU factorization without pivoting. A vanishing
    /// pivot is an error instead of being perturbed.
    Complete,
}

/// Incomplete LU factorization `A ≈ L U` with unit lower triangular `L`.
///
/// Applying the factorization computes `y = ω U⁻¹ L⁻¹ x` with the relaxation factor `ω`.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteLu<T> {
    /// Strictly lower part of `L`, per row sorted by column.
    lower: Vec<Vec<(usize, T)>>,
    diagonal: Vec<T>,
    /// Strictly upper part of `U`, per row sorted by column.
    upper: Vec<Vec<(usize, T)>>,
    relaxation: T,
}

impl<T: Real> IncompleteLu<T> {
    pub fn threshold(matrix: &CsrView<T>, drop_tolerance: T, fill_factor: usize) -> Result<Self, PreconditionerError> {
        Self::factor(
            matrix,
            IluDropRule::Threshold {
                drop_tolerance,
                fill_factor,
            },
        )
    }

    pub fn level(matrix: &CsrView<T>, level: usize) -> Result<Self, PreconditionerError> {
        Self::factor(matrix, IluDropRule::Level(level))
    }

    /// Exact sparse LU factorization in the given ordering.
    pub fn complete(matrix: &CsrView<T>) -> Result<Self, PreconditionerError> {
        Self::factor(matrix, IluDropRule::Complete)
    }

    pub fn with_relaxation(self, relaxation: T) -> Self {
        Self { relaxation, ..self }
    }

    pub fn dim(&self) -> usize {
        self.diagonal.len()
    }

    /// Number of stored entries of `L` and `U`, including the diagonal.
    pub fn nnz(&self) -> usize {
        let off_diagonal: usize = self
            .lower
            .iter()
            .chain(&self.upper)
            .map(Vec::len)
            .sum();
        off_diagonal + self.diagonal.len()
    }

    /// Row-wise IKJ elimination with the given drop rule.
    pub fn factor(matrix: &CsrView<T>, rule: IluDropRule<T>) -> Result<Self, PreconditionerError> {
        check_square(matrix)?;
        let n = matrix.nrows();
        let fill_limit = match rule {
            IluDropRule::Threshold { fill_factor, .. } => Some(fill_factor * matrix.nnz() / n.max(1) + 1),
            IluDropRule::Level(_) | IluDropRule::Complete => None,
        };
        let pivot_scale: T = nalgebra::convert(1.0e-4);

        let mut lower = Vec::with_capacity(n);
        let mut diagonal = Vec::with_capacity(n);
        let mut upper: Vec<Vec<(usize, T)>> = Vec::with_capacity(n);
        let mut upper_levels: Vec<Vec<usize>> = Vec::with_capacity(n);

        let mut work = vec![T::zero(); n];
        let mut levels = vec![NOT_IN_ROW; n];
        let mut touched = Vec::new();
        let mut pending = BTreeSet::new();
        let mut upper_cols = Vec::new();

        for i in 0..n {
            let (cols, vals) = matrix.row(i);
            let row_norm = vals
                .iter()
                .fold(T::zero(), |acc, &v| acc + v * v)
                .sqrt();
            if row_norm == T::zero() {
                return Err(PreconditionerError::ZeroRow { row: i });
            }
            let threshold = match rule {
                IluDropRule::Threshold { drop_tolerance, .. } => drop_tolerance * row_norm,
                IluDropRule::Level(_) | IluDropRule::Complete => T::zero(),
            };

            levels[i] = 0;
            touched.push(i);
            for (&j, &v) in cols.iter().zip(vals) {
                work[j] = v;
                if j != i {
                    levels[j] = 0;
                    touched.push(j);
                    if j < i {
                        pending.insert(j);
                    } else {
                        upper_cols.push(j);
                    }
                }
            }

            let mut lower_row = Vec::new();
            while let Some(k) = pending.pop_first() {
                let factor = work[k] / diagonal[k];
                let level_k = levels[k];
                let keep = match rule {
                    IluDropRule::Threshold { .. } => factor.abs() > threshold,
                    IluDropRule::Level(max_level) => level_k <= max_level,
                    IluDropRule::Complete => true,
                };
                if !keep {
                    work[k] = T::zero();
                    continue;
                }
                lower_row.push((k, factor));

                for (&(j, u_kj), &level_kj) in upper[k].iter().zip(&upper_levels[k]) {
                    let fill_level = level_k.saturating_add(level_kj).saturating_add(1);
                    if levels[j] == NOT_IN_ROW {
                        if let IluDropRule::Level(max_level) = rule {
                            if fill_level > max_level {
                                continue;
                            }
                        }
                        levels[j] = fill_level;
                        work[j] = T::zero();
                        touched.push(j);
                        if j < i {
                            pending.insert(j);
                        } else if j > i {
                            upper_cols.push(j);
                        }
                    } else {
                        levels[j] = levels[j].min(fill_level);
                    }
                    work[j] -= factor * u_kj;
                }
            }

            let mut diagonal_i = work[i];
            if matches!(rule, IluDropRule::Complete) && (diagonal_i == T::zero() || !diagonal_i.is_finite()) {
                return Err(PreconditionerError::ZeroPivot { row: i });
            }
            if diagonal_i == T::zero() {
                diagonal_i = threshold + pivot_scale * row_norm;
            }

            let mut upper_row: Vec<(usize, T)> = upper_cols
                .iter()
                .map(|&j| (j, work[j]))
                .filter(|(_, v)| match rule {
                    IluDropRule::Threshold { .. } => v.abs() > threshold,
                    IluDropRule::Level(_) | IluDropRule::Complete => true,
                })
                .collect();
            if let Some(limit) = fill_limit {
                keep_largest(&mut lower_row, limit);
                keep_largest(&mut upper_row, limit);
            }
            lower_row.sort_unstable_by_key(|&(j, _)| j);
            upper_row.sort_unstable_by_key(|&(j, _)| j);

            upper_levels.push(upper_row.iter().map(|&(j, _)| levels[j]).collect());
            lower.push(lower_row);
            diagonal.push(diagonal_i);
            upper.push(upper_row);

            for j in touched.drain(..) {
                work[j] = T::zero();
                levels[j] = NOT_IN_ROW;
            }
            upper_cols.clear();
        }

        Ok(Self {
            lower,
            diagonal,
            upper,
            relaxation: T::one(),
        })
    }

    /// Overwrites `x` with `ω U⁻¹ L⁻¹ x`.
    pub fn solve_in_place(&self, x: &mut [T]) {
        assert_eq!(x.len(), self.dim());
        for i in 0..x.len() {
            let sum = self.lower[i]
                .iter()
                .fold(T::zero(), |acc, &(k, l_ik)| acc + l_ik * x[k]);
            x[i] -= sum;
        }
        for i in (0..x.len()).rev() {
            let sum = self.upper[i]
                .iter()
                .fold(T::zero(), |acc, &(j, u_ij)| acc + u_ij * x[j]);
            x[i] = (x[i] - sum) / self.diagonal[i];
        }
        if self.relaxation != T::one() {
            x.iter_mut().for_each(|x_i| *x_i *= self.relaxation);
        }
    }
}

fn keep_largest<T: Real>(entries: &mut Vec<(usize, T)>, limit: usize) {
    if entries.len() > limit {
        entries.sort_unstable_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(Ordering::Equal));
        entries.truncate(limit);
    }
}

impl<T: Real> LinearOperator<T> for IncompleteLu<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        assert_eq!(y.len(), x.len());
        let mut buffer: Vec<T> = x.iter().copied().collect();
        self.solve_in_place(&mut buffer);
        for (y_i, b_i) in y.iter_mut().zip(buffer) {
            *y_i = b_i;
        }
    }
}
