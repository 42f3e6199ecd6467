//! CUDA Client implementation
//!
//! CudaClient owns stream and context for direct cudarc access.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The underlying
//! CUDA context and stream are reference-counted via `Arc`.

use bytemuck::Zeroable;
use cudarc::driver::safe::{CudaContext, CudaStream};
use cudarc::driver::{DeviceRepr, ValidAsZeroBits};
use std::sync::Arc;

use super::CudaRuntime;
use super::buffer::CudaBuffer;
use super::device::CudaDevice;
use crate::error::{Error, Result};
use crate::runtime::transfer::{TransferConfig, copy_in_slices, staged_download};
use crate::runtime::{Residency, RuntimeClient};

// ============================================================================
// CudaClient
// ============================================================================

/// CUDA Runtime Client
///
/// Owns the CUDA context and stream that every kernel of this client launches
/// on. Host/device copies are explicit, block the calling thread and move at
/// most `transfer.staging_bytes` per copy call.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all kernels launch
    pub(crate) stream: Arc<CudaStream>,

    /// Chunking of host/device copies
    pub(crate) transfer: TransferConfig,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .field("transfer", &self.transfer)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the context or stream cannot be created
    /// (no driver, invalid device index).
    pub fn new(device: CudaDevice) -> Result<Self> {
        Self::with_transfer_config(device, TransferConfig::default())
    }

    /// Create a client with explicit transfer chunking
    pub fn with_transfer_config(device: CudaDevice, transfer: TransferConfig) -> Result<Self> {
        let name = format!("cuda:{}", device.index);
        let context = std::panic::catch_unwind(|| CudaContext::new(device.index))
            .map_err(|_| Error::device_unavailable(&name, "CUDA driver library could not be loaded"))?
            .map_err(|e| Error::device_unavailable(&name, e.to_string()))?;

        let stream = context
            .new_stream()
            .map_err(|e| Error::device_unavailable(&name, format!("stream creation: {e}")))?;

        tracing::debug!(device = device.index, "created CUDA client");

        Ok(Self {
            device,
            context,
            stream,
            transfer,
        })
    }

    /// Get reference to the CUDA stream.
    #[inline]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// Transfer chunking in use
    pub fn transfer_config(&self) -> TransferConfig {
        self.transfer
    }

    /// Residency tag for buffers owned by this client
    pub fn residency(&self) -> Residency {
        Residency::Device(self.device.index)
    }

    /// Allocate `len` zeroed elements on the device
    pub fn alloc_zeros<T: DeviceRepr + ValidAsZeroBits>(&self, len: usize) -> Result<CudaBuffer<T>> {
        // Zero-length allocations are not portable across driver versions.
        let slice = self.stream.alloc_zeros::<T>(len.max(1))?;
        Ok(CudaBuffer {
            slice,
            len,
            device_index: self.device.index,
        })
    }

    /// Copy `host` into a new device buffer
    ///
    /// # Errors
    ///
    /// `TransferFailure` if any slice of the copy fails; the partially
    /// written buffer is dropped.
    pub fn upload<T: DeviceRepr + ValidAsZeroBits>(&self, host: &[T]) -> Result<CudaBuffer<T>> {
        let mut buffer = self.alloc_zeros::<T>(host.len())?;
        copy_in_slices::<T, _>(&self.transfer, host.len(), |range| {
            let mut dst = buffer.slice.slice_mut(range.clone());
            self.stream.memcpy_htod(&host[range], &mut dst)?;
            Ok(())
        })?;
        Ok(buffer)
    }

    /// Copy a device buffer into `host`
    ///
    /// `host` is only written if every slice arrives.
    pub fn download<T: DeviceRepr + Zeroable + Copy>(
        &self,
        buffer: &CudaBuffer<T>,
        host: &mut [T],
    ) -> Result<()> {
        if host.len() != buffer.len {
            return Err(Error::shape_mismatch(buffer.len, host.len()));
        }
        staged_download(&self.transfer, host, |range, out| {
            let src = buffer.slice.slice(range);
            self.stream.memcpy_dtoh(&src, out)?;
            Ok(())
        })?;
        // memcpy_dtoh into pageable memory is synchronous, but a prior kernel
        // error surfaces only at the next synchronization.
        self.stream.synchronize()?;
        Ok(())
    }

    /// Copy a device buffer into a new host vector
    pub fn download_vec<T: DeviceRepr + Zeroable + Copy>(&self, buffer: &CudaBuffer<T>) -> Result<Vec<T>> {
        let mut host = vec![T::zeroed(); buffer.len];
        self.download(buffer, &mut host)?;
        Ok(host)
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()?;
        Ok(())
    }
}
