//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// An allocator for a single (world) dimension.
///
/// Grid geometries map between reference and world points of the same dimension, so this is
/// the only bound generic grid code needs to spell out.
pub trait DimAllocator<T: Scalar, D: DimName>:
Allocator<T, D>
+ Allocator<T, D, D>
+ Allocator<T, U1, D>
// Index and flag buffers of dimension D, e.g. for multi-indices of structured cells
+ Allocator<usize, D>
+ Allocator<bool, D>
// Conversions to f64 coordinates for diagnostics
+ Allocator<f64, D>
{}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>
        + Allocator<T, D, D>
        + Allocator<T, U1, D>
        + Allocator<usize, D>
        + Allocator<bool, D>
        + Allocator<f64, D>,
{
}
