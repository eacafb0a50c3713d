//! Solves `-Δu = 1` on the unit square with finite differences on the finest level of a cube grid,
//! then locates a few sample points in the grid and reports the discrete solution there.
use eyre::WrapErr;
use femstuff::grid::search::HierarchicSearch;
use femstuff::grid::{CubeCell, CubeGrid, GridHierarchy, GridView, GridWalk, LevelView};
use femstuff::la::{DenseVector, MatrixInterface, Solver, SparseMatrix, SparsityPattern, VectorInterface};
use nalgebra::{DVector, Point2, Vector2, U2};

/// Indices of the edge neighbors of `cell` within its level.
fn neighbors(grid: &CubeGrid<f64, U2>, cell: CubeCell, level: usize) -> impl Iterator<Item = usize> + '_ {
    let m = grid.multi_index(cell);
    [(-1, 0), (1, 0), (0, -1), (0, 1)]
        .into_iter()
        .filter_map(move |(dx, dy)| {
            let i = m.x.checked_add_signed(dx)?;
            let j = m.y.checked_add_signed(dy)?;
            grid.cell_at(level, &Vector2::new(i, j))
        })
        .map(|neighbor| neighbor.index())
}

fn main() -> eyre::Result<()> {
    let grid = CubeGrid::<f64, U2>::unit(4, 3);
    let fine = LevelView::new(&grid, grid.max_level());
    let n = fine.num_entities();
    let h = GridWalk::new(&fine)
        .min_diameter()
        .ok_or_else(|| eyre::eyre!("grid has no cells"))?;
    println!("{} unknowns on level {}, h = {}", n, grid.max_level(), h);

    let level = grid.max_level();
    let mut pattern = SparsityPattern::new(n);
    for row in 0..n {
        pattern.insert(row, row)?;
        for col in neighbors(&grid, fine.entities()[row], level) {
            pattern.insert(row, col)?;
        }
    }

    // Cells next to the boundary see a zero ghost value, so the diagonal stays 4 / h^2
    let mut a = SparseMatrix::new(n, n, &pattern)?;
    let h2 = h * h;
    for row in 0..n {
        a.set_entry(row, row, 4.0 / h2)?;
        for col in neighbors(&grid, fine.entities()[row], level) {
            a.set_entry(row, col, -1.0 / h2)?;
        }
    }

    let b = DenseVector::from(DVector::from_element(n, 1.0));
    let mut u = DenseVector::zeros(n);
    Solver::new(&a)
        .apply_type(&b, &mut u, "cg.diagonal.lower")
        .wrap_err("failed to solve the finite difference system")?;

    let samples = [
        Point2::new(0.5, 0.5),
        Point2::new(0.1, 0.1),
        Point2::new(0.9, 0.3),
        Point2::new(1.0, 1.0),
    ];
    let cells = HierarchicSearch::new(&fine).search(&samples)?;
    for (sample, cell) in samples.iter().zip(&cells) {
        println!(
            "u({:.2}, {:.2}) ~ {:.6} in cell {:?}",
            sample.x,
            sample.y,
            u.get_entry(cell.index()),
            grid.multi_index(*cell).as_slice()
        );
    }
    println!("max u = {:.6}", u.sup_norm());
    Ok(())
}
