//! Execution backends for segment algorithms
//!
//! This module defines the `Runtime` trait family and the
//! [`ExecutionContext`] capability that segment kernels are written against.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific GPU/CPU)
//! └── Client (owns thread pool or stream, created explicitly)
//!
//! ExecutionContext (submit_range / parallel_for / synchronize)
//! └── CpuClient (sequential loop or rayon pool)
//! ```
//!
//! The CUDA backend runs generated kernels for the built-in reductions
//! instead of arbitrary host closures; see `sparse::DeviceSparseMatrix`.

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod cuda;
pub(crate) mod helpers;
mod select;
pub mod transfer;
mod traits;

pub use select::DeviceSpec;
pub use traits::{Device, ExecutionContext, Runtime, RuntimeClient};
pub use transfer::TransferConfig;

/// Lanes per warp on every supported device
pub const WARP_SIZE: usize = 32;

/// Where a buffer's storage lives
///
/// Buffers never migrate implicitly; moving data between residencies is an
/// explicit copy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Residency {
    /// Host memory
    #[default]
    Host,
    /// Memory of the CUDA device with this index
    Device(usize),
}

impl std::fmt::Display for Residency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Device(index) => write!(f, "cuda:{index}"),
        }
    }
}
