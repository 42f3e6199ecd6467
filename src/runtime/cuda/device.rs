//! CUDA Device implementation

use crate::runtime::Device;

/// CUDA Device using cudarc
///
/// Only an index; the context and stream live in [`super::CudaClient`].
#[derive(Clone, Debug, Default)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Ordinal of this device
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}
