use femstuff::grid::{CubeGrid, GridHierarchy};
use matrixcompare::assert_matrix_eq;
use nalgebra::{Point2, Point3, Vector2, Vector3, U2, U3};
use std::collections::HashSet;

fn rectangle_grid() -> CubeGrid<f64, U2> {
    CubeGrid::new(Point2::new(-1.0, 0.0), Point2::new(2.0, 1.0), Vector2::new(3, 2), 2)
}

#[test]
fn cube_grid_levels_have_expected_sizes() {
    let grid = rectangle_grid();
    assert_eq!(grid.max_level(), 2);
    assert_eq!(grid.level_entities(0).len(), 6);
    assert_eq!(grid.level_entities(1).len(), 24);
    assert_eq!(grid.level_entities(2).len(), 96);
    assert_eq!(grid.cells_per_axis(2), Vector2::new(12, 8));
    assert_matrix_eq!(grid.cell_size(1), Vector2::new(0.5, 0.25), comp = abs, tol = 1e-15);

    for level in 0..=2 {
        for (index, &cell) in grid.level_entities(level).iter().enumerate() {
            assert_eq!(grid.level(cell), level);
            assert_eq!(cell.index(), index);
        }
    }
}

#[test]
fn cube_grid_children_partition_next_level() {
    let grid = rectangle_grid();
    for level in 0..grid.max_level() {
        let mut seen = HashSet::new();
        for &cell in grid.level_entities(level) {
            let children = grid.children(cell);
            assert_eq!(children.len(), 4);
            for &child in children {
                assert_eq!(grid.level(child), level + 1);
                assert!(seen.insert(child), "child {:?} has two parents", child);

                // The center of every child lies in the parent
                let center = grid.map_reference_coords(child, &Point2::new(0.5, 0.5));
                assert!(grid.contains_point(cell, &center));
            }
        }
        assert_eq!(seen.len(), grid.level_entities(level + 1).len());
    }

    for &leaf in grid.level_entities(2) {
        assert!(grid.children(leaf).is_empty());
        assert!(grid.is_leaf(leaf));
    }
}

#[test]
fn cube_grid_children_are_ordered_first_axis_fastest() {
    let grid = CubeGrid::<f64, U2>::unit(2, 1);
    let parent = grid.level_entities(0)[1];
    let children: Vec<_> = grid
        .children(parent)
        .iter()
        .map(|&child| grid.multi_index(child))
        .collect();
    assert_eq!(
        children,
        vec![
            Vector2::new(2, 0),
            Vector2::new(3, 0),
            Vector2::new(2, 1),
            Vector2::new(3, 1)
        ]
    );
}

#[test]
fn cube_grid_reference_and_physical_coords_are_inverse() {
    let grid = rectangle_grid();
    let xi = Point2::new(0.25, 0.75);
    for level in 0..=grid.max_level() {
        for &cell in grid.level_entities(level) {
            let x = grid.map_reference_coords(cell, &xi);
            let xi_mapped = grid.map_physical_coords(cell, &x);
            assert_matrix_eq!(xi_mapped.coords, xi.coords, comp = abs, tol = 1e-12);
        }
    }
}

#[test]
fn cube_grid_corners() {
    let grid = rectangle_grid();
    let cell = grid
        .cell_at(0, &Vector2::new(1, 1))
        .unwrap();
    let corners = grid.corners(cell);
    assert_eq!(
        corners,
        vec![
            Point2::new(0.0, 0.5),
            Point2::new(1.0, 0.5),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0)
        ]
    );
    assert_eq!(grid.cell_origin(cell), Point2::new(0.0, 0.5));
    assert!(grid.cell_at(0, &Vector2::new(3, 0)).is_none());
    assert!(grid.cell_at(3, &Vector2::new(0, 0)).is_none());
}

#[test]
fn cube_grid_containment_includes_boundary_up_to_tolerance() {
    let grid = CubeGrid::<f64, U2>::unit(1, 0);
    let cell = grid.level_entities(0)[0];
    assert!(grid.reference_contains(cell, &Point2::new(0.0, 1.0)));
    assert!(grid.reference_contains(cell, &Point2::new(1.0 + 1e-12, -1e-12)));
    assert!(!grid.reference_contains(cell, &Point2::new(1.0 + 1e-8, 0.5)));

    let loose = grid.clone().with_tolerance(1e-6);
    assert!(loose.reference_contains(cell, &Point2::new(1.0 + 1e-8, 0.5)));
    assert!(!loose.contains_point(cell, &Point2::new(0.5, -0.1)));
}

#[test]
fn cube_grid_in_three_dimensions() {
    let grid = CubeGrid::<f64, U3>::new(
        Point3::origin(),
        Point3::new(1.0, 2.0, 4.0),
        Vector3::new(1, 2, 4),
        1,
    );
    assert_eq!(grid.level_entities(0).len(), 8);
    assert_eq!(grid.level_entities(1).len(), 64);

    let cell = grid.level_entities(0)[7];
    assert_eq!(grid.multi_index(cell), Vector3::new(0, 1, 3));
    assert_eq!(grid.children(cell).len(), 8);
    assert_eq!(grid.corners(cell).len(), 8);
    assert!(grid.contains_point(cell, &Point3::new(0.5, 1.5, 3.5)));
}

#[test]
fn cube_grid_rejects_empty_box() {
    let result = std::panic::catch_unwind(|| {
        CubeGrid::<f64, U2>::new(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Vector2::new(1, 1), 0)
    });
    assert!(result.is_err());
}

#[test]
fn cube_grid_serde_round_trip() {
    let grid = rectangle_grid().with_tolerance(1e-8);
    let json = serde_json::to_string(&grid).unwrap();
    let restored: CubeGrid<f64, U2> = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.lower(), grid.lower());
    assert_eq!(restored.upper(), grid.upper());
    assert_eq!(restored.tolerance(), 1e-8);
    for level in 0..=grid.max_level() {
        assert_eq!(restored.level_entities(level), grid.level_entities(level));
        for &cell in grid.level_entities(level) {
            assert_eq!(restored.children(cell), grid.children(cell));
        }
    }
}
