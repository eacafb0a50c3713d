mod cube_grid;
mod search;
mod views;
mod walk;
