use nalgebra::RealField;

pub use nalgebra;

/// Scalar type used by grids, containers and solvers.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

pub mod allocators;
