//! CPU runtime implementation
//!
//! The CPU runtime is the semantic reference for every segment algorithm.
//! A [`CpuClient`] runs work either as a plain sequential loop or on a rayon
//! thread pool (feature `rayon`, enabled by default); both execute the same
//! closures and, for a fixed kernel, combine elements in the same order.

mod client;
mod device;
mod runtime;

pub use client::{CpuClient, ParallelismConfig};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
