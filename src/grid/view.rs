use crate::allocators::DimAllocator;
use crate::grid::{GridDim, GridEntity, GridHierarchy, GridView};
use crate::Real;
use nalgebra::DefaultAllocator;
use rustc_hash::FxHashSet;
use std::marker::PhantomData;

/// All cells of one level.
#[derive(Debug)]
pub struct LevelView<'a, T, G> {
    grid: &'a G,
    level: usize,
    marker: PhantomData<T>,
}

impl<'a, T, G> LevelView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    /// Panics if `level` exceeds the finest level of the grid.
    pub fn new(grid: &'a G, level: usize) -> Self {
        assert!(
            level <= grid.max_level(),
            "Level {} does not exist, the finest level is {}.",
            level,
            grid.max_level()
        );
        Self {
            grid,
            level,
            marker: PhantomData,
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }
}

impl<'a, T, G> GridView<T> for LevelView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    type Grid = G;

    fn grid(&self) -> &G {
        self.grid
    }

    fn entities(&self) -> &[GridEntity<T, G>] {
        self.grid.level_entities(self.level)
    }

    fn contains(&self, entity: GridEntity<T, G>) -> bool {
        self.grid.level(entity) == self.level
    }
}

/// Cached ordered cell list with a hash set for membership queries.
#[derive(Debug)]
struct EntitySubset<E> {
    entities: Vec<E>,
    members: FxHashSet<E>,
}

impl<E> EntitySubset<E>
where
    E: Copy + Eq + std::hash::Hash,
{
    fn new(entities: Vec<E>) -> Self {
        let members = entities.iter().copied().collect();
        Self { entities, members }
    }
}

/// All cells without children, ordered by level and then by their order within the level.
#[derive(Debug)]
pub struct LeafView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    grid: &'a G,
    subset: EntitySubset<GridEntity<T, G>>,
}

impl<'a, T, G> LeafView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    pub fn new(grid: &'a G) -> Self {
        let leaves = (0..=grid.max_level())
            .flat_map(|level| grid.level_entities(level).iter().copied())
            .filter(|&entity| grid.is_leaf(entity))
            .collect();
        Self {
            grid,
            subset: EntitySubset::new(leaves),
        }
    }
}

impl<'a, T, G> GridView<T> for LeafView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    type Grid = G;

    fn grid(&self) -> &G {
        self.grid
    }

    fn entities(&self) -> &[GridEntity<T, G>] {
        &self.subset.entities
    }

    fn contains(&self, entity: GridEntity<T, G>) -> bool {
        self.subset.members.contains(&entity)
    }
}

/// The cells of another view that satisfy a predicate, e.g. the cells owned by one process.
///
/// The order of the underlying view is kept.
#[derive(Debug)]
pub struct PartitionView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    grid: &'a G,
    subset: EntitySubset<GridEntity<T, G>>,
}

impl<'a, T, G> PartitionView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    pub fn new<V>(view: &'a V, predicate: impl Fn(GridEntity<T, G>) -> bool) -> Self
    where
        V: GridView<T, Grid = G>,
    {
        let entities = view
            .entities()
            .iter()
            .copied()
            .filter(|&entity| predicate(entity))
            .collect();
        Self {
            grid: view.grid(),
            subset: EntitySubset::new(entities),
        }
    }
}

impl<'a, T, G> GridView<T> for PartitionView<'a, T, G>
where
    T: Real,
    G: GridHierarchy<T>,
    DefaultAllocator: DimAllocator<T, GridDim<T, G>>,
{
    type Grid = G;

    fn grid(&self) -> &G {
        self.grid
    }

    fn entities(&self) -> &[GridEntity<T, G>] {
        &self.subset.entities
    }

    fn contains(&self, entity: GridEntity<T, G>) -> bool {
        self.subset.members.contains(&entity)
    }
}
