use crate::grid::CubeGrid;
use ::proptest::prelude::*;
use nalgebra::{Point2, Point3, Vector2, U2};

/// Points in the closed unit square.
pub fn unit_point2() -> impl Strategy<Value = Point2<f64>> {
    [0.0..=1.0, 0.0..=1.0].prop_map(|[x, y]| Point2::new(x, y))
}

/// Points in the closed unit cube.
pub fn unit_point3() -> impl Strategy<Value = Point3<f64>> {
    [0.0..=1.0, 0.0..=1.0, 0.0..=1.0].prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Two-dimensional cube grids on `[0, 1]^2` with `1..=max_coarse_cells` cells per axis on the
/// coarsest level and `0..=max_refinements` refinements.
pub fn cube_grid2(max_coarse_cells: usize, max_refinements: usize) -> impl Strategy<Value = CubeGrid<f64, U2>> {
    (1..=max_coarse_cells, 1..=max_coarse_cells, 0..=max_refinements).prop_map(|(nx, ny, refinements)| {
        CubeGrid::new(
            Point2::origin(),
            Point2::new(1.0, 1.0),
            Vector2::new(nx, ny),
            refinements,
        )
    })
}
