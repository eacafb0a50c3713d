//! Refinement hierarchies of cells and views on them.
//!
//! A [`GridHierarchy`] is an immutable stack of levels `0..=max_level`, where every cell of a
//! level that is not the finest may be split into children on the next level. A [`GridView`]
//! picks an ordered subset of the cells, e.g. all cells of one level or all leaves, and is what
//! the searches in [`search`] and the [`GridWalk`](walk::GridWalk) operate on.
use crate::allocators::DimAllocator;
use crate::{Real, SmallDim};
use nalgebra::{DefaultAllocator, OPoint};
use std::fmt::Debug;
use std::hash::Hash;

mod cube;
pub mod search;
mod view;
mod walk;

pub use cube::{CubeCell, CubeGrid};
pub use view::{LeafView, LevelView, PartitionView};
pub use walk::{entity_diameter, GridWalk};

/// Cell handle of a grid.
pub type GridEntity<T, G> = <G as GridHierarchy<T>>::Entity;

/// World dimension of a grid.
pub type GridDim<T, G> = <G as GridHierarchy<T>>::GeometryDim;

/// World (or reference) point of a grid.
pub type GridPoint<T, G> = OPoint<T, GridDim<T, G>>;

pub trait GridHierarchy<T>
where
    T: Real,
    DefaultAllocator: DimAllocator<T, Self::GeometryDim>,
{
    type GeometryDim: SmallDim;
    type Entity: Copy + Eq + Hash + Debug;

    /// Index of the finest level.
    fn max_level(&self) -> usize;

    /// All cells of `level`, in the grid's order.
    ///
    /// Panics if `level > self.max_level()`.
    fn level_entities(&self, level: usize) -> &[Self::Entity];

    fn level(&self, entity: Self::Entity) -> usize;

    /// Direct children of the cell on the next finer level. Empty for leaves.
    fn children(&self, entity: Self::Entity) -> &[Self::Entity];

    fn corners(&self, entity: Self::Entity) -> Vec<OPoint<T, Self::GeometryDim>>;

    /// Maps reference coordinates of the cell to world coordinates.
    fn map_reference_coords(
        &self,
        entity: Self::Entity,
        reference_coords: &OPoint<T, Self::GeometryDim>,
    ) -> OPoint<T, Self::GeometryDim>;

    /// Maps world coordinates to reference coordinates of the cell.
    fn map_physical_coords(&self, entity: Self::Entity, x: &OPoint<T, Self::GeometryDim>) -> OPoint<T, Self::GeometryDim>;

    /// Whether the reference coordinates lie in the reference element, boundary included up to a
    /// small tolerance.
    fn reference_contains(&self, entity: Self::Entity, reference_coords: &OPoint<T, Self::GeometryDim>) -> bool;

    /// Whether the world point lies in the cell.
    fn contains_point(&self, entity: Self::Entity, x: &OPoint<T, Self::GeometryDim>) -> bool {
        let xi = self.map_physical_coords(entity, x);
        self.reference_contains(entity, &xi)
    }

    fn is_leaf(&self, entity: Self::Entity) -> bool {
        self.children(entity).is_empty()
    }
}

/// An ordered sequence of cells of a grid hierarchy together with a membership predicate.
pub trait GridView<T>
where
    T: Real,
    DefaultAllocator: DimAllocator<T, GridDim<T, Self::Grid>>,
{
    type Grid: GridHierarchy<T>;

    fn grid(&self) -> &Self::Grid;

    fn entities(&self) -> &[GridEntity<T, Self::Grid>];

    fn contains(&self, entity: GridEntity<T, Self::Grid>) -> bool;

    fn num_entities(&self) -> usize {
        self.entities().len()
    }
}

