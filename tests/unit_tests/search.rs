use crate::cell_centers_2d;
use femstuff::grid::search::{HierarchicSearch, InlevelSearch, SearchError};
use femstuff::grid::{CubeCell, CubeGrid, GridHierarchy, GridView, LeafView, LevelView, PartitionView};
use femstuff::proptest::{cube_grid2, unit_point2, unit_point3};
use nalgebra::{Point2, Point3, Vector2, Vector3, U2, U3};
use proptest::prelude::*;

/// 4x4 fine cells on the unit square, refined once from 2x2 coarse cells.
fn two_level_grid() -> CubeGrid<f64, U2> {
    CubeGrid::unit(2, 1)
}

#[test]
fn inlevel_search_finds_cell_centers_in_order() {
    let grid = two_level_grid();
    let view = LevelView::new(&grid, 1);
    let centers = cell_centers_2d(&grid, 1);
    assert_eq!(centers.len(), 16);
    // Row-major order of the centers
    assert_eq!(centers[1], Point2::new(0.375, 0.125));
    assert_eq!(centers[4], Point2::new(0.125, 0.375));

    let mut search = InlevelSearch::new(&view);
    let cells = search.search(&centers).unwrap();
    assert_eq!(cells, grid.level_entities(1).to_vec());
    assert_eq!(search.cursor(), 15);
}

#[test]
fn hierarchic_search_finds_cell_centers_in_order() {
    let grid = two_level_grid();
    let centers = cell_centers_2d(&grid, 1);

    let fine = LevelView::new(&grid, 1);
    let cells = HierarchicSearch::new(&fine).search(&centers).unwrap();
    assert_eq!(cells, grid.level_entities(1).to_vec());

    // Starting on the target level needs no descent at all
    let from_fine = HierarchicSearch::new(&fine).with_start_level(1);
    assert_eq!(from_fine.search(&centers).unwrap(), cells);

    let leaves = LeafView::new(&grid);
    assert_eq!(HierarchicSearch::new(&leaves).search(&centers).unwrap(), cells);
}

#[test]
fn hierarchic_search_stops_at_target_view() {
    let grid = CubeGrid::<f64, U2>::unit(2, 2);
    let coarse = LevelView::new(&grid, 0);
    let points = [Point2::new(0.9, 0.1), Point2::new(0.1, 0.9)];
    let cells = HierarchicSearch::new(&coarse).search(&points).unwrap();
    assert_eq!(cells, vec![grid.level_entities(0)[1], grid.level_entities(0)[2]]);

    let middle = LevelView::new(&grid, 1);
    let cells = HierarchicSearch::new(&middle).search(&points).unwrap();
    assert!(cells.iter().all(|&cell| grid.level(cell) == 1));
    assert_eq!(grid.multi_index(cells[0]), Vector2::new(3, 0));

    // Start levels beyond the hierarchy are clamped
    let clamped = HierarchicSearch::new(&middle).with_start_level(10);
    assert_eq!(clamped.start_level(), 2);
    let cells = clamped.search(&points).unwrap();
    assert!(cells.iter().all(|&cell| grid.level(cell) == 2));
}

#[test]
fn points_outside_the_domain_fail_fast() {
    let grid = two_level_grid();
    let view = LevelView::new(&grid, 1);
    let points = [Point2::new(0.5, 0.5), Point2::new(1.5, 0.5), Point2::new(0.2, 0.2)];

    let mut search = InlevelSearch::new(&view);
    let err = search.search(&points).unwrap_err();
    assert_eq!(
        err,
        SearchError::PointNotFound {
            index: 1,
            point: vec![1.5, 0.5]
        }
    );
    assert!(err.to_string().contains("point 1"));

    let err = HierarchicSearch::new(&view).search(&points).unwrap_err();
    assert!(matches!(err, SearchError::PointNotFound { index: 1, .. }));
}

#[test]
fn empty_query_gives_empty_result() {
    let grid = two_level_grid();
    let view = LevelView::new(&grid, 0);
    assert!(InlevelSearch::new(&view).search(&[]).unwrap().is_empty());
    assert!(HierarchicSearch::new(&view).search(&[]).unwrap().is_empty());
}

#[test]
fn duplicate_points_map_to_the_same_cell() {
    let grid = two_level_grid();
    let view = LevelView::new(&grid, 1);
    let p = Point2::new(0.6, 0.3);
    let cells = InlevelSearch::new(&view)
        .search(&[p, p, p])
        .unwrap();
    assert_eq!(cells[0], cells[1]);
    assert_eq!(cells[1], cells[2]);
}

#[test]
fn boundary_points_resolve_to_first_hit_from_cursor() {
    let grid = two_level_grid();
    let view = LevelView::new(&grid, 0);
    let shared_corner = Point2::new(0.5, 0.5);

    let mut search = InlevelSearch::new(&view);
    assert_eq!(search.search(&[shared_corner]).unwrap(), vec![grid.level_entities(0)[0]]);

    // Once the cursor has moved on, the same point resolves to the cell at the cursor
    search.search(&[Point2::new(0.75, 0.75)]).unwrap();
    assert_eq!(search.cursor(), 3);
    assert_eq!(search.search(&[shared_corner]).unwrap(), vec![grid.level_entities(0)[3]]);
}

#[test]
fn cursor_keeps_sorted_queries_cheap() {
    let n = 32;
    let grid = CubeGrid::<f64, U2>::unit(n, 0);
    let view = LevelView::new(&grid, 0);
    let num_cells = view.num_entities();

    // Four points per cell, visiting the cells in their storage order
    let points: Vec<_> = cell_centers_2d(&grid, 0)
        .into_iter()
        .flat_map(|center| {
            let h = 0.25 / n as f64;
            [
                Point2::new(center.x - h, center.y - h),
                Point2::new(center.x + h, center.y - h),
                Point2::new(center.x - h, center.y + h),
                Point2::new(center.x + h, center.y + h),
            ]
        })
        .collect();

    let mut search = InlevelSearch::new(&view);
    let cells = search.search(&points).unwrap();
    assert_eq!(cells.len(), points.len());
    assert!(search.num_containment_checks() <= 2 * points.len());
    assert!(search.num_containment_checks() * 100 < points.len() * num_cells);
}

#[test]
fn partition_view_restricts_search() {
    let grid = two_level_grid();
    let fine = LevelView::new(&grid, 1);
    let owned = PartitionView::new(&fine, |cell: CubeCell| grid.multi_index(cell).x < 2);
    assert_eq!(owned.num_entities(), 8);

    let inside = Point2::new(0.1, 0.9);
    let outside = Point2::new(0.9, 0.9);
    let mut search = InlevelSearch::new(&owned);
    let cells = search.search(&[inside]).unwrap();
    assert!(owned.contains(cells[0]));
    assert!(search.search(&[outside]).is_err());

    // The hierarchic search accepts cells of the partition only, or else the finest level
    let cells = HierarchicSearch::new(&owned)
        .search(&[inside, outside])
        .unwrap();
    assert!(owned.contains(cells[0]));
    assert!(!owned.contains(cells[1]));
    assert_eq!(grid.level(cells[1]), 1);
}

proptest! {
    #[test]
    fn both_searches_return_containing_cells(grid in cube_grid2(4, 2), points in prop::collection::vec(unit_point2(), 0..20)) {
        for level in 0..=grid.max_level() {
            let view = LevelView::new(&grid, level);
            let cells = InlevelSearch::new(&view).search(&points).unwrap();
            prop_assert_eq!(cells.len(), points.len());
            for (cell, point) in cells.iter().zip(&points) {
                let xi = grid.map_physical_coords(*cell, point);
                prop_assert!(grid.reference_contains(*cell, &xi));
                prop_assert_eq!(grid.level(*cell), level);
            }

            let cells = HierarchicSearch::new(&view).search(&points).unwrap();
            prop_assert_eq!(cells.len(), points.len());
            for (cell, point) in cells.iter().zip(&points) {
                prop_assert!(grid.contains_point(*cell, point));
                prop_assert!(view.contains(*cell));
            }
        }
    }

    #[test]
    fn hierarchic_search_in_three_dimensions(points in prop::collection::vec(unit_point3(), 1..20)) {
        let grid = CubeGrid::<f64, U3>::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0), Vector3::new(2, 1, 3), 2);
        let leaves = LeafView::new(&grid);
        let cells = HierarchicSearch::new(&leaves).search(&points).unwrap();
        for (cell, point) in cells.iter().zip(&points) {
            prop_assert_eq!(grid.level(*cell), 2);
            prop_assert!(grid.contains_point(*cell, point));
        }
    }
}
