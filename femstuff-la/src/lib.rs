//! Linear algebra containers and solver dispatch.
//!
//! Two container backends share the interfaces of the [`container`] module: the nalgebra backend
//! ([`DenseVector`], [`DenseMatrix`], [`SparseMatrix`]) and the self-contained row-major engine
//! ([`NativeVector`], [`NativeSparseMatrix`]). Every matrix type registers a set of named
//! algorithms with the [`Solver`] front-end.

pub mod container;
pub mod csr;
pub mod direct;
pub mod error;
pub mod krylov;
pub mod preconditioner;
pub mod solver;

pub use container::dense::{DenseMatrix, DenseVector};
pub use container::native::{NativeSparseMatrix, NativeVector};
pub use container::pattern::SparsityPattern;
pub use container::sparse::SparseMatrix;
pub use container::{ContainerInterface, MatrixInterface, VectorInterface};
pub use error::ContainerError;
pub use solver::{check_solves_system, ComputationStatus, Solver, SolverBackend, SolverError, SolverOptions};

pub use femstuff_traits::Real;
pub use nalgebra;
pub use nalgebra_sparse;
