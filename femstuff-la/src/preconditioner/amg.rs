use crate::csr::{CsrData, CsrView};
use crate::krylov::LinearOperator;
use crate::preconditioner::{check_square, IncompleteLu, PreconditionerError};
use crate::Real;
use log::{debug, info};
use nalgebra::{DVector, DVectorView, DVectorViewMut, Dyn, LU};
use std::collections::BTreeMap;

const UNASSIGNED: usize = usize::MAX;

/// Strong coupling threshold: `|a_ij| >= θ sqrt(|a_ii a_jj|)`.
const STRENGTH_THRESHOLD: f64 = 0.08;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AmgSettings<T> {
    /// Number of pre- and post-smoothing steps on every level.
    pub smoother_iterations: usize,
    /// Relaxation factor of the ILU(0) smoother.
    pub smoother_relaxation: T,
    /// Maximum number of levels, the coarsest included.
    pub max_level: usize,
    /// Coarsening stops once a level has at most this many unknowns.
    pub coarse_target: usize,
    /// Coarsening stops once `n_fine / n_coarse` drops below this rate.
    pub min_coarse_rate: T,
    /// Scaling of the coarse grid correction.
    pub prolongation_damping: T,
    /// Aggregates hold at most `3^dim` nodes.
    pub anisotropy_dim: usize,
    pub verbose: bool,
}

impl Default for AmgSettings<f64> {
    fn default() -> Self {
        Self {
            smoother_iterations: 1,
            smoother_relaxation: 1.0,
            max_level: 15,
            coarse_target: 2000,
            min_coarse_rate: 1.2,
            prolongation_damping: 1.6,
            anisotropy_dim: 2,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Level<T> {
    matrix: CsrData<T>,
    smoother: IncompleteLu<T>,
    /// Aggregate index of every node of this level.
    aggregates: Vec<usize>,
    num_aggregates: usize,
}

#[derive(Debug, Clone)]
enum CoarseSolver<T: Real> {
    /// Dense LU, only built once the coarsest level is within the coarse target.
    Direct(LU<T, Dyn, Dyn>),
    /// ILU(0) smoothing from zero, used when coarsening stalls above the coarse target.
    Smoother { matrix: CsrData<T>, smoother: IncompleteLu<T> },
}

/// Aggregation-based algebraic multigrid, applied as one V-cycle.
///
/// Unknowns are grouped into aggregates of strongly coupled neighbours, prolongation is
/// piecewise constant and coarse matrices are Galerkin products. Every level except the coarsest
/// is smoothed with ILU(0). The coarsest level is solved with a dense LU factorization if it has
/// at most `coarse_target` unknowns and is smoothed like the other levels otherwise.
#[derive(Debug, Clone)]
pub struct AggregationAmg<T: Real> {
    levels: Vec<Level<T>>,
    coarse_solver: CoarseSolver<T>,
    coarse_size: usize,
    settings: AmgSettings<T>,
}

impl<T: Real> AggregationAmg<T> {
    pub fn new(matrix: &CsrView<T>, settings: AmgSettings<T>) -> Result<Self, PreconditionerError> {
        check_square(matrix)?;
        let max_aggregate_size = 3usize.saturating_pow(settings.anisotropy_dim as u32).max(2);

        let mut levels = Vec::new();
        let mut current = matrix.to_owned();
        loop {
            let n = current.nrows();
            if levels.len() + 1 >= settings.max_level.max(1) || n <= settings.coarse_target {
                break;
            }
            let (aggregates, num_aggregates) = aggregate(&current.view(), max_aggregate_size);
            let rate = nalgebra::convert::<f64, T>(n as f64) / nalgebra::convert(num_aggregates.max(1) as f64);
            if num_aggregates == 0 || rate < settings.min_coarse_rate {
                break;
            }
            let coarse = galerkin_product(&current.view(), &aggregates, num_aggregates);
            let smoother = IncompleteLu::level(&current.view(), 0)?.with_relaxation(settings.smoother_relaxation);
            if settings.verbose {
                info!("AMG level {}: {} unknowns, {} aggregates", levels.len(), n, num_aggregates);
            }
            levels.push(Level {
                matrix: current,
                smoother,
                aggregates,
                num_aggregates,
            });
            current = coarse;
        }

        let size = current.nrows();
        let coarse_solver = if size <= settings.coarse_target {
            let lu = current.view().to_dense().lu();
            if !lu.is_invertible() {
                return Err(PreconditionerError::SingularCoarseMatrix { size });
            }
            CoarseSolver::Direct(lu)
        } else {
            debug!("AMG coarsening stalled at {} unknowns, smoothing the coarsest level.", size);
            let smoother = IncompleteLu::level(&current.view(), 0)?.with_relaxation(settings.smoother_relaxation);
            CoarseSolver::Smoother {
                matrix: current,
                smoother,
            }
        };
        debug!(
            "Built aggregation AMG with {} levels, coarsest level has {} unknowns.",
            levels.len() + 1,
            size
        );
        Ok(Self {
            levels,
            coarse_solver,
            coarse_size: size,
            settings,
        })
    }

    /// Number of levels, the coarsest included.
    pub fn num_levels(&self) -> usize {
        self.levels.len() + 1
    }

    /// Number of unknowns on every level, finest first.
    pub fn level_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.levels.iter().map(|level| level.matrix.nrows()).collect();
        sizes.push(self.coarse_size);
        sizes
    }

    /// Whether the coarsest level is solved by a direct factorization.
    pub fn has_direct_coarse_solver(&self) -> bool {
        matches!(self.coarse_solver, CoarseSolver::Direct(_))
    }

    fn coarse_solve(&self, b: &DVector<T>) -> DVector<T> {
        match &self.coarse_solver {
            CoarseSolver::Direct(lu) => lu.solve(b).unwrap_or_else(|| DVector::zeros(b.len())),
            CoarseSolver::Smoother { matrix, smoother } => {
                let mut x = DVector::zeros(b.len());
                let iterations = self.settings.smoother_iterations.max(1);
                smooth(&matrix.view(), smoother, b, &mut x, iterations);
                x
            }
        }
    }

    /// Approximately solves `A x = b` on level `index`, starting from `x = 0`.
    fn v_cycle(&self, index: usize, b: &DVector<T>) -> DVector<T> {
        let level = match self.levels.get(index) {
            Some(level) => level,
            None => return self.coarse_solve(b),
        };
        let matrix = level.matrix.view();
        let iterations = self.settings.smoother_iterations;
        let mut x = DVector::zeros(b.len());

        smooth(&matrix, &level.smoother, b, &mut x, iterations);

        // Restrict the residual by summing over aggregates
        let mut fine_residual = DVector::zeros(b.len());
        matrix.spmv(fine_residual.as_mut_slice(), x.as_slice());
        let mut coarse_rhs = DVector::zeros(level.num_aggregates);
        for (i, &agg) in level.aggregates.iter().enumerate() {
            coarse_rhs[agg] += b[i] - fine_residual[i];
        }

        let correction = self.v_cycle(index + 1, &coarse_rhs);
        let damping = self.settings.prolongation_damping;
        for (i, &agg) in level.aggregates.iter().enumerate() {
            x[i] += damping * correction[agg];
        }

        smooth(&matrix, &level.smoother, b, &mut x, iterations);
        x
    }
}

/// `iterations` steps of `x += M⁻¹ (b - A x)` with the smoother `M`.
fn smooth<T: Real>(matrix: &CsrView<T>, smoother: &IncompleteLu<T>, b: &DVector<T>, x: &mut DVector<T>, iterations: usize) {
    let mut residual = DVector::zeros(b.len());
    for _ in 0..iterations {
        matrix.spmv(residual.as_mut_slice(), x.as_slice());
        residual.zip_apply(b, |r_i, b_i| *r_i = b_i - *r_i);
        smoother.solve_in_place(residual.as_mut_slice());
        *x += &residual;
    }
}

impl<T: Real> LinearOperator<T> for AggregationAmg<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) {
        let b = x.clone_owned();
        y.copy_from(&self.v_cycle(0, &b));
    }
}

fn is_strong<T: Real>(a_ij: T, a_ii: T, a_jj: T) -> bool {
    let theta: T = nalgebra::convert(STRENGTH_THRESHOLD);
    a_ij.abs() >= theta * (a_ii * a_jj).abs().sqrt()
}

/// Greedy aggregation over the strong couplings.
///
/// The first pass builds aggregates around nodes whose strong neighbours are all unassigned, the
/// second attaches leftover nodes to an adjacent aggregate and the third turns whatever remains
/// into new aggregates.
fn aggregate<T: Real>(matrix: &CsrView<T>, max_aggregate_size: usize) -> (Vec<usize>, usize) {
    let n = matrix.nrows();
    let diagonal = matrix.diagonal();
    let strong_neighbors = |i: usize| {
        let (cols, vals) = matrix.row(i);
        cols.iter()
            .zip(vals)
            .filter(|&(&j, &a_ij)| j != i && is_strong(a_ij, diagonal[i], diagonal[j]))
            .map(|(&j, _)| j)
            .collect::<Vec<_>>()
    };

    let mut aggregates = vec![UNASSIGNED; n];
    let mut count = 0;

    for i in 0..n {
        if aggregates[i] != UNASSIGNED {
            continue;
        }
        let neighbors = strong_neighbors(i);
        if neighbors.iter().all(|&j| aggregates[j] == UNASSIGNED) {
            aggregates[i] = count;
            for &j in neighbors.iter().take(max_aggregate_size - 1) {
                aggregates[j] = count;
            }
            count += 1;
        }
    }

    for i in 0..n {
        if aggregates[i] == UNASSIGNED {
            if let Some(&j) = strong_neighbors(i)
                .iter()
                .find(|&&j| aggregates[j] != UNASSIGNED)
            {
                aggregates[i] = aggregates[j];
            }
        }
    }

    for i in 0..n {
        if aggregates[i] == UNASSIGNED {
            aggregates[i] = count;
            let mut size = 1;
            for j in strong_neighbors(i) {
                if size < max_aggregate_size && aggregates[j] == UNASSIGNED {
                    aggregates[j] = count;
                    size += 1;
                }
            }
            count += 1;
        }
    }

    (aggregates, count)
}

/// `Pᵀ A P` for the piecewise constant prolongation defined by `aggregates`.
fn galerkin_product<T: Real>(matrix: &CsrView<T>, aggregates: &[usize], num_aggregates: usize) -> CsrData<T> {
    let mut rows = vec![BTreeMap::new(); num_aggregates];
    for (i, j, a_ij) in matrix.triplet_iter() {
        *rows[aggregates[i]]
            .entry(aggregates[j])
            .or_insert_with(T::zero) += a_ij;
    }
    CsrData::from_rows(num_aggregates, rows)
}
