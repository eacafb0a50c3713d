use crate::allocators::DimAllocator;
use crate::grid::GridHierarchy;
use crate::{Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{convert, DefaultAllocator, OPoint, OVector, Scalar};
use serde::{Deserialize, Serialize};

/// A cell of a [`CubeGrid`], identified by its level and its linear index on that level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CubeCell {
    level: usize,
    index: usize,
}

impl CubeCell {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Axis-aligned Cartesian grid with uniform dyadic refinements.
///
/// Level 0 consists of `coarse_cells[k]` cells along axis `k`, and every refinement halves each
/// cell along every axis, so that a cell has `2^D` children. Cells of a level are numbered
/// linearly with the first axis running fastest, and children are ordered the same way within
/// their parent.
///
/// Reference coordinates of a cell are taken in the unit cube `[0, 1]^D`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct CubeGrid<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    lower: OPoint<T, D>,
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    upper: OPoint<T, D>,
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<usize, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<usize, D>>::Buffer: Deserialize<'de>"
    ))]
    coarse_cells: OVector<usize, D>,
    cells: Vec<Vec<CubeCell>>,
    // children[l][2^D * i .. 2^D * (i + 1)] are the children of cell i on level l
    children: Vec<Vec<CubeCell>>,
    tolerance: T,
}

fn multi_index<D>(mut index: usize, shape: &OVector<usize, D>) -> OVector<usize, D>
where
    D: SmallDim,
    DefaultAllocator: Allocator<usize, D>,
{
    OVector::<usize, D>::from_fn(|k, _| {
        let m_k = index % shape[k];
        index /= shape[k];
        m_k
    })
}

fn linear_index<D>(multi_index: &OVector<usize, D>, shape: &OVector<usize, D>) -> usize
where
    D: SmallDim,
    DefaultAllocator: Allocator<usize, D>,
{
    multi_index
        .iter()
        .zip(shape.iter())
        .rev()
        .fold(0, |index, (&m_k, &n_k)| index * n_k + m_k)
}

impl<T, D> CubeGrid<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Creates the box `[lower, upper]` with `coarse_cells` cells per axis on level 0 and
    /// `refinements` additional levels.
    ///
    /// Panics if the box is empty along some axis or some axis has no cells.
    pub fn new(
        lower: OPoint<T, D>,
        upper: OPoint<T, D>,
        coarse_cells: OVector<usize, D>,
        refinements: usize,
    ) -> Self {
        assert!(
            lower.iter().zip(upper.iter()).all(|(l, u)| l < u),
            "Lower corner must be strictly smaller than upper corner along every axis."
        );
        assert!(coarse_cells.iter().all(|&n| n > 0), "Every axis needs at least one cell.");

        let num_children = 1 << D::dim();
        let shape = |level: usize| coarse_cells.map(|n| n << level);

        let cells = (0..=refinements)
            .map(|level| {
                let count: usize = shape(level).iter().product();
                (0..count).map(|index| CubeCell { level, index }).collect()
            })
            .collect();

        let mut children = Vec::with_capacity(refinements);
        for level in 0..refinements {
            let coarse_shape = shape(level);
            let fine_shape = shape(level + 1);
            let count: usize = coarse_shape.iter().product();
            let mut level_children = Vec::with_capacity(count * num_children);
            for index in 0..count {
                let parent = multi_index(index, &coarse_shape);
                for corner in 0..num_children {
                    let child = OVector::<usize, D>::from_fn(|k, _| 2 * parent[k] + ((corner >> k) & 1));
                    level_children.push(CubeCell {
                        level: level + 1,
                        index: linear_index(&child, &fine_shape),
                    });
                }
            }
            children.push(level_children);
        }

        Self {
            lower,
            upper,
            coarse_cells,
            cells,
            children,
            tolerance: convert(1.0e-10),
        }
    }

    /// The unit cube `[0, 1]^D` with `cells_per_axis` cells along every axis on level 0.
    pub fn unit(cells_per_axis: usize, refinements: usize) -> Self {
        Self::new(
            OPoint::origin(),
            OPoint::from(OVector::<T, D>::repeat(T::one())),
            OVector::<usize, D>::repeat(cells_per_axis),
            refinements,
        )
    }

    /// Sets the tolerance by which reference coordinates may lie outside the unit cube and still
    /// count as inside.
    pub fn with_tolerance(mut self, tolerance: T) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> T {
        self.tolerance
    }

    pub fn lower(&self) -> &OPoint<T, D> {
        &self.lower
    }

    pub fn upper(&self) -> &OPoint<T, D> {
        &self.upper
    }

    pub fn cells_per_axis(&self, level: usize) -> OVector<usize, D> {
        self.coarse_cells.map(|n| n << level)
    }

    /// Edge lengths of the cells on `level`.
    pub fn cell_size(&self, level: usize) -> OVector<T, D> {
        let extents = &self.upper - &self.lower;
        let counts = self
            .cells_per_axis(level)
            .map(|n| convert::<f64, T>(n as f64));
        extents.component_div(&counts)
    }

    pub fn multi_index(&self, cell: CubeCell) -> OVector<usize, D> {
        multi_index(cell.index, &self.cells_per_axis(cell.level))
    }

    /// The cell of `level` at the given multi-index, if both exist.
    pub fn cell_at(&self, level: usize, multi_index: &OVector<usize, D>) -> Option<CubeCell> {
        if level > self.max_level() {
            return None;
        }
        let shape = self.cells_per_axis(level);
        if multi_index.iter().zip(shape.iter()).any(|(m, n)| m >= n) {
            return None;
        }
        Some(CubeCell {
            level,
            index: linear_index(multi_index, &shape),
        })
    }

    /// Corner of the cell with the smallest coordinates.
    pub fn cell_origin(&self, cell: CubeCell) -> OPoint<T, D> {
        let h = self.cell_size(cell.level);
        let m = self
            .multi_index(cell)
            .map(|m_k| convert::<f64, T>(m_k as f64));
        &self.lower + h.component_mul(&m)
    }
}

impl<T, D> GridHierarchy<T> for CubeGrid<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    type GeometryDim = D;
    type Entity = CubeCell;

    fn max_level(&self) -> usize {
        self.cells.len() - 1
    }

    fn level_entities(&self, level: usize) -> &[CubeCell] {
        &self.cells[level]
    }

    fn level(&self, entity: CubeCell) -> usize {
        entity.level
    }

    fn children(&self, entity: CubeCell) -> &[CubeCell] {
        match self.children.get(entity.level) {
            Some(level_children) => {
                let num_children = 1 << D::dim();
                &level_children[num_children * entity.index..num_children * (entity.index + 1)]
            }
            None => &[],
        }
    }

    fn corners(&self, entity: CubeCell) -> Vec<OPoint<T, D>> {
        let origin = self.cell_origin(entity);
        let h = self.cell_size(entity.level);
        (0..1usize << D::dim())
            .map(|corner| {
                let offset = OVector::<T, D>::from_fn(|k, _| if (corner >> k) & 1 == 1 { h[k] } else { T::zero() });
                &origin + offset
            })
            .collect()
    }

    fn map_reference_coords(&self, entity: CubeCell, reference_coords: &OPoint<T, D>) -> OPoint<T, D> {
        let h = self.cell_size(entity.level);
        self.cell_origin(entity) + h.component_mul(&reference_coords.coords)
    }

    fn map_physical_coords(&self, entity: CubeCell, x: &OPoint<T, D>) -> OPoint<T, D> {
        let h = self.cell_size(entity.level);
        OPoint::from((x - self.cell_origin(entity)).component_div(&h))
    }

    fn reference_contains(&self, _entity: CubeCell, reference_coords: &OPoint<T, D>) -> bool {
        let tol = self.tolerance;
        reference_coords
            .iter()
            .all(|&xi_k| xi_k >= -tol && xi_k <= T::one() + tol)
    }
}
