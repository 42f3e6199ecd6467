//! Typed device buffers

use crate::runtime::Residency;
use cudarc::driver::safe::CudaSlice;
use cudarc::driver::DeviceRepr;

/// Device allocation of `len` elements of `T`
///
/// Created by [`super::CudaClient::upload`] or
/// [`super::CudaClient::alloc_zeros`]; read back with
/// [`super::CudaClient::download`]. Memory is released on drop.
pub struct CudaBuffer<T: DeviceRepr> {
    pub(crate) slice: CudaSlice<T>,
    pub(crate) len: usize,
    pub(crate) device_index: usize,
}

impl<T: DeviceRepr> CudaBuffer<T> {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Where this buffer lives
    pub fn residency(&self) -> Residency {
        Residency::Device(self.device_index)
    }
}

impl<T: DeviceRepr> std::fmt::Debug for CudaBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaBuffer")
            .field("len", &self.len)
            .field("device", &self.device_index)
            .finish_non_exhaustive()
    }
}
