//! Sparse matrices over segment layouts
//!
//! [`SparseMatrix`] treats each row as one segment of a layout and stores a
//! column index and a value per slot. Any layout can back it:
//!
//! ```rust,ignore
//! use segmr::prelude::*;
//!
//! // CSR rows (the default layout)
//! let csr = SparseMatrix::<f64, i32>::with_row_capacities(3, 3, &[2, 3, 2])?;
//!
//! // Column-major Ellpack rows, coalesced on GPUs
//! let layout = Ellpack::<i32>::new(ElementsOrganization::ColumnMajor);
//! let mut ell = SparseMatrix::<f64, i32, Ellpack<i32>>::with_layout(3, 3, layout);
//! ell.set_row_capacities(&[2, 3, 2])?;
//! ```
//!
//! Row reductions (`vector_product`, `row_sums`, `row_reduce`, `trace`) all
//! go through the segment reduction kernels, so they run on any
//! [`crate::runtime::ExecutionContext`]. With the `cuda` feature,
//! [`DeviceSparseMatrix`] runs the built-in reductions on a GPU.

mod matrix;
mod row;

#[cfg(feature = "cuda")]
mod device;

pub use matrix::{MatrixElement, MatrixElements, SparseMatrix};
pub use row::{RowView, RowViewMut};

#[cfg(feature = "cuda")]
pub use device::DeviceSparseMatrix;
