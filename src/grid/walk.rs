use crate::allocators::DimAllocator;
use crate::grid::{GridDim, GridEntity, GridHierarchy, GridView};
use crate::Real;
use itertools::Itertools;
use nalgebra::DefaultAllocator;
use std::marker::PhantomData;

/// Visits the cells of a view in view order.
#[derive(Debug)]
pub struct GridWalk<'a, T, V> {
    view: &'a V,
    marker: PhantomData<T>,
}

impl<'a, T, V> GridWalk<'a, T, V>
where
    T: Real,
    V: GridView<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, V::Grid>>,
{
    pub fn new(view: &'a V) -> Self {
        Self {
            view,
            marker: PhantomData,
        }
    }

    /// Calls `f` with every cell and its position in the view.
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(GridEntity<T, V::Grid>, usize),
    {
        for (index, &entity) in self.view.entities().iter().enumerate() {
            f(entity, index);
        }
    }

    /// Smallest [`entity_diameter`] over the view, `None` for an empty view.
    pub fn min_diameter(&self) -> Option<T> {
        let grid = self.view.grid();
        let mut h_min: Option<T> = None;
        self.walk(|entity, _| {
            let h = entity_diameter(grid, entity);
            h_min = Some(h_min.map_or(h, |h_min| h_min.min(h)));
        });
        h_min
    }
}

/// Characteristic size of a cell: the smallest distance between two of its corners.
///
/// Zero for cells with fewer than two corners.
pub fn entity_diameter<T, G>(grid: &G, entity: GridEntity<T, G>) -> T
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    grid.corners(entity)
        .iter()
        .tuple_combinations()
        .map(|(a, b)| (b - a).norm())
        .reduce(|h_min, h| h_min.min(h))
        .unwrap_or_else(T::zero)
}
