use femstuff::grid::{CubeCell, CubeGrid, GridHierarchy, GridView, LeafView, LevelView, PartitionView};
use nalgebra::U2;
use util::assert_panics;

#[test]
fn level_view_holds_exactly_one_level() {
    let grid = CubeGrid::<f64, U2>::unit(2, 2);
    for level in 0..=grid.max_level() {
        let view = LevelView::new(&grid, level);
        assert_eq!(view.level(), level);
        assert_eq!(view.entities(), grid.level_entities(level));
        assert_eq!(view.num_entities(), 4 << (2 * level));

        for other in 0..=grid.max_level() {
            for &cell in grid.level_entities(other) {
                assert_eq!(view.contains(cell), other == level);
            }
        }
    }
}

#[test]
fn level_view_rejects_missing_level() {
    let grid = CubeGrid::<f64, U2>::unit(2, 1);
    assert_panics!(LevelView::new(&grid, 2));
}

#[test]
fn leaf_view_of_uniform_refinement_is_finest_level() {
    let grid = CubeGrid::<f64, U2>::unit(3, 2);
    let leaves = LeafView::new(&grid);
    assert_eq!(leaves.entities(), grid.level_entities(2));
    assert!(grid
        .level_entities(1)
        .iter()
        .all(|&cell| !leaves.contains(cell)));

    // Without refinement the coarse cells are the leaves
    let flat = CubeGrid::<f64, U2>::unit(3, 0);
    let leaves = LeafView::new(&flat);
    assert_eq!(leaves.num_entities(), 9);
    assert!(flat
        .level_entities(0)
        .iter()
        .all(|&cell| leaves.contains(cell)));
}

#[test]
fn partition_view_keeps_order_of_underlying_view() {
    let grid = CubeGrid::<f64, U2>::unit(4, 0);
    let level = LevelView::new(&grid, 0);
    let even = PartitionView::new(&level, |cell: CubeCell| cell.index() % 2 == 0);
    let indices: Vec<_> = even
        .entities()
        .iter()
        .map(|cell| cell.index())
        .collect();
    assert_eq!(indices, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    assert!(even.contains(grid.level_entities(0)[4]));
    assert!(!even.contains(grid.level_entities(0)[5]));

    // Partitions of partitions narrow down further
    let quarter = PartitionView::new(&even, |cell: CubeCell| cell.index() % 4 == 0);
    assert_eq!(quarter.num_entities(), 4);

    let nothing = PartitionView::new(&level, |_: CubeCell| false);
    assert_eq!(nothing.num_entities(), 0);
    assert!(!nothing.contains(grid.level_entities(0)[0]));
}
