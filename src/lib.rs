//! # segmr
//!
//! **Segmented storage layouts and segment reduction kernels for CPU and CUDA.**
//!
//! segmr stores ragged collections (sparse-matrix rows, adjacency lists,
//! variable-length per-entity data) in one flat buffer and runs
//! "for each segment, combine its elements" over that buffer with the same
//! closures on a sequential loop, a rayon thread pool, or a CUDA device.
//!
//! ## Layouts
//!
//! - **CSR**: prefix-sum offsets, no padding
//! - **Ellpack**: one padded width, row-major or column-major placement
//! - **SlicedEllpack**: Ellpack padded per slice of 32 segments
//! - **BiEllpack**: warp-sized strips sorted by length and split into
//!   power-of-two groups, bounding padding to twice the stored elements
//!
//! All layouts implement [`segments::Segments`] and hand out a borrowed
//! [`segments::SegmentsView`] that kernels read without bounds checks.
//!
//! ## Kernels
//!
//! [`segments::kernels`] provides Scalar (one worker per segment), Vector (one
//! warp per segment) and Hybrid (threads per segment chosen from the average
//! segment size) reductions driven by user `fetch`/`reduce`/`keep` closures.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segmr::prelude::*;
//!
//! let client = CpuRuntime::default_client(&CpuDevice::new())?;
//! let mut m = SparseMatrix::<f64, i32>::with_row_capacities(3, 3, &[2, 3, 2])?;
//! m.set_element(0, 0, 2.0)?;
//! m.set_element(1, 2, -1.0)?;
//! let sums = m.row_sums(&client)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): Multi-threaded host execution
//! - `cuda`: NVIDIA CUDA backend (kernels compiled at runtime via NVRTC)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod dtype;
pub mod error;
pub mod io;
pub mod runtime;
pub mod segments;
pub mod sparse;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::{DType, Element, SegmentIndex};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};
    pub use crate::runtime::{Device, DeviceSpec, ExecutionContext, Runtime, RuntimeClient};
    pub use crate::segments::kernels::{
        FetchKind, HybridKernel, KernelKind, ReduceOp, ReductionKernel, ScalarKernel,
        SegmentReduction, SegmentReductionKernel, VectorKernel,
    };
    pub use crate::segments::{
        AnySegments, BiEllpack, Csr, ElementsOrganization, Ellpack, Segments, SegmentsKind,
        SegmentsView, SlicedEllpack,
    };
    pub use crate::sparse::SparseMatrix;

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};

    #[cfg(feature = "cuda")]
    pub use crate::sparse::DeviceSparseMatrix;
}
