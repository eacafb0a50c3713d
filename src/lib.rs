use nalgebra::{DimMin, DimName};

pub mod grid;

#[cfg(feature = "proptest")]
pub mod proptest;

pub mod la {
    pub use femstuff_la::*;
}

pub use femstuff_traits::allocators;
pub use femstuff_traits::Real;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// A small, fixed-size dimension.
///
/// Used as a trait alias for various traits frequently needed by generic `femstuff` routines.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}
