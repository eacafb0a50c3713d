use femstuff::grid::{entity_diameter, CubeCell, CubeGrid, GridHierarchy, GridWalk, LevelView, PartitionView};
use nalgebra::{Point2, Vector2, U2};

fn rectangle_grid() -> CubeGrid<f64, U2> {
    CubeGrid::new(Point2::new(-1.0, 0.0), Point2::new(2.0, 1.0), Vector2::new(3, 2), 2)
}

#[test]
fn walk_visits_cells_in_view_order() {
    let grid = rectangle_grid();
    let view = LevelView::new(&grid, 1);
    let mut visited = Vec::new();
    GridWalk::new(&view).walk(|cell, index| visited.push((cell, index)));

    assert_eq!(visited.len(), 24);
    for (position, &(cell, index)) in visited.iter().enumerate() {
        assert_eq!(index, position);
        assert_eq!(cell, grid.level_entities(1)[position]);
    }
}

#[test]
fn diameter_of_rectangular_cell_is_shortest_edge() {
    let grid = rectangle_grid();
    let cell = grid.level_entities(0)[0];
    assert!((entity_diameter(&grid, cell) - 0.5).abs() < 1e-14);

    let finest = grid.level_entities(2)[17];
    assert!((entity_diameter(&grid, finest) - 0.125).abs() < 1e-14);
}

#[test]
fn min_diameter_over_view() {
    let grid = rectangle_grid();
    for (level, expected) in [(0, 0.5), (1, 0.25), (2, 0.125)] {
        let view = LevelView::new(&grid, level);
        let h = GridWalk::new(&view).min_diameter().unwrap();
        assert!((h - expected).abs() < 1e-14);
    }

    let view = LevelView::new(&grid, 0);
    let empty = PartitionView::new(&view, |_: CubeCell| false);
    assert_eq!(GridWalk::new(&empty).min_diameter(), None);
}
