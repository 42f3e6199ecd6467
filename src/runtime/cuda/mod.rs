//! CUDA runtime implementation
//!
//! GPU execution through cudarc. Reduction kernels are generated as CUDA C
//! for the requested layout, reduction and launch width, compiled once per
//! device with NVRTC and cached.
//!
//! - `CudaDevice` - Represents a CUDA GPU device
//! - `CudaClient` - Owns context and stream, moves data in staging-sized slices
//! - `CudaBuffer` - Typed device allocation tagged with its residency
//! - `CudaRuntime` - Implements the generic Runtime trait

mod buffer;
mod client;
mod device;
pub(crate) mod kernels;

pub use buffer::CudaBuffer;
pub use client::CudaClient;
pub use device::CudaDevice;

use crate::error::{Error, Result};
use crate::runtime::Runtime;
use cudarc::driver::safe::CudaContext;

/// CUDA compute runtime
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;

    fn name() -> &'static str {
        "cuda"
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        CudaClient::new(device.clone())
    }
}

/// Number of CUDA devices visible to this process
///
/// # Errors
///
/// `DeviceUnavailable` if the driver library cannot be loaded or queried.
pub fn device_count() -> Result<usize> {
    // Dynamic loading panics when libcuda is missing.
    let count = std::panic::catch_unwind(CudaContext::device_count).map_err(|_| {
        Error::device_unavailable("cuda", "CUDA driver library could not be loaded")
    })?;
    let count = count.map_err(|e| Error::device_unavailable("cuda", e.to_string()))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Check if a usable CUDA device is present
pub fn is_cuda_available() -> bool {
    matches!(device_count(), Ok(n) if n > 0)
}
