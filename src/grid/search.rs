//! Locating the cells that contain given world points.
//!
//! Two strategies are provided. [`InlevelSearch`] scans the cells of a view linearly, starting at
//! the cell that contained the previous point. For spatially sorted queries the next hit is
//! usually close by, so the scan is cheap even though it is linear in the worst case.
//! [`HierarchicSearch`] instead descends the refinement hierarchy from a coarse level, which
//! needs no ordering of the queries at all.
//!
//! Both strategies fail fast: the first point that is not contained in any candidate cell aborts
//! the search with [`SearchError::PointNotFound`].
use crate::allocators::DimAllocator;
use crate::grid::{GridDim, GridEntity, GridHierarchy, GridPoint, GridView};
use crate::Real;
use log::trace;
use nalgebra::DefaultAllocator;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchError {
    /// No candidate cell contains the point with the given index in the query.
    PointNotFound { index: usize, point: Vec<f64> },
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointNotFound { index, point } => {
                write!(f, "no cell contains point {} at {:?}", index, point)
            }
        }
    }
}

impl Error for SearchError {}

fn point_not_found<T, G>(index: usize, point: &GridPoint<T, G>) -> SearchError
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    SearchError::PointNotFound {
        index,
        point: point
            .iter()
            .map(|&x_k| nalgebra::try_convert(x_k).unwrap_or(f64::NAN))
            .collect(),
    }
}

/// Linear scan over the cells of a view with a cursor that survives between calls.
#[derive(Debug)]
pub struct InlevelSearch<'a, T, V> {
    view: &'a V,
    cursor: usize,
    num_containment_checks: usize,
    marker: PhantomData<T>,
}

impl<'a, T, V> InlevelSearch<'a, T, V>
where
    T: Real,
    V: GridView<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, V::Grid>>,
{
    pub fn new(view: &'a V) -> Self {
        Self {
            view,
            cursor: 0,
            num_containment_checks: 0,
            marker: PhantomData,
        }
    }

    /// Position in the view of the cell that contained the most recent point.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total number of cell containment tests performed by this search so far.
    pub fn num_containment_checks(&self) -> usize {
        self.num_containment_checks
    }

    /// Returns one containing cell per point, in the order of the points.
    ///
    /// Each scan starts at the cursor, runs to the end of the view and then wraps around to its
    /// beginning. For points on a boundary shared by several cells the first hit in that order is
    /// returned.
    pub fn search(
        &mut self,
        points: &[GridPoint<T, V::Grid>],
    ) -> Result<Vec<GridEntity<T, V::Grid>>, SearchError> {
        let view = self.view;
        let grid = view.grid();
        let entities = view.entities();
        let mut result = Vec::with_capacity(points.len());

        for (index, point) in points.iter().enumerate() {
            let start = self.cursor.min(entities.len());
            let candidates = (start..entities.len()).chain(0..start);
            let mut found = None;
            for position in candidates {
                self.num_containment_checks += 1;
                if grid.contains_point(entities[position], point) {
                    found = Some(position);
                    break;
                }
            }

            match found {
                Some(position) => {
                    trace!("Point {} found in cell {:?} at position {}.", index, entities[position], position);
                    self.cursor = position;
                    result.push(entities[position]);
                }
                None => return Err(point_not_found::<T, V::Grid>(index, point)),
            }
        }

        Ok(result)
    }
}

/// Search that descends the refinement hierarchy until it reaches a cell of the target view.
#[derive(Debug)]
pub struct HierarchicSearch<'a, T, V> {
    view: &'a V,
    start_level: usize,
    marker: PhantomData<T>,
}

impl<'a, T, V> HierarchicSearch<'a, T, V>
where
    T: Real,
    V: GridView<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, V::Grid>>,
{
    /// Starts every descent at the coarsest level.
    pub fn new(view: &'a V) -> Self {
        Self {
            view,
            start_level: 0,
            marker: PhantomData,
        }
    }

    /// Starts every descent at `start_level`, clamped to the finest level of the grid.
    pub fn with_start_level(mut self, start_level: usize) -> Self {
        self.start_level = start_level.min(self.view.grid().max_level());
        self
    }

    pub fn start_level(&self) -> usize {
        self.start_level
    }

    /// Returns one cell per point, in the order of the points.
    ///
    /// A cell containing the point is accepted if the target view contains it or it lies on
    /// the finest level or has no children. Otherwise the search continues among its children.
    pub fn search(&self, points: &[GridPoint<T, V::Grid>]) -> Result<Vec<GridEntity<T, V::Grid>>, SearchError> {
        let grid = self.view.grid();
        let start = grid.level_entities(self.start_level);
        points
            .iter()
            .enumerate()
            .map(|(index, point)| match self.descend(start, point) {
                Some(entity) => {
                    trace!("Point {} found in cell {:?}.", index, entity);
                    Ok(entity)
                }
                None => Err(point_not_found::<T, V::Grid>(index, point)),
            })
            .collect()
    }

    fn descend(
        &self,
        candidates: &[GridEntity<T, V::Grid>],
        point: &GridPoint<T, V::Grid>,
    ) -> Option<GridEntity<T, V::Grid>> {
        let grid = self.view.grid();
        for &entity in candidates {
            if !grid.contains_point(entity, point) {
                continue;
            }
            let children = grid.children(entity);
            if self.view.contains(entity) || grid.level(entity) >= grid.max_level() || children.is_empty() {
                return Some(entity);
            }
            // A point on the parent's boundary can miss every child by round-off, in which case
            // the remaining candidates of this level get their chance.
            if let Some(found) = self.descend(children, point) {
                return Some(found);
            }
        }
        None
    }
}
