//! CUDA kernel compilation and module caching
//!
//! Kernel sources are generated at runtime and compiled to PTX with NVRTC.
//! Modules are cached per `(device, kernel name)`; a kernel name fully
//! determines its source, so a cache hit never needs recompiling.
//!
//! # Thread Safety
//!
//! The module cache is a `parking_lot::Mutex<HashMap>` behind a `OnceLock`
//! and may be used concurrently from several clients.

use cudarc::driver::safe::{CudaContext, CudaFunction, CudaModule, LaunchConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

// ============================================================================
// Kernel Module Cache
// ============================================================================

type ModuleCache = Mutex<HashMap<(usize, String), Arc<CudaModule>>>;

static MODULE_CACHE: OnceLock<ModuleCache> = OnceLock::new();

/// Get or compile the module named `name` for a device
///
/// `source` is only invoked on a cache miss.
pub(crate) fn get_or_compile_module(
    context: &Arc<CudaContext>,
    device_index: usize,
    name: &str,
    source: impl FnOnce() -> String,
) -> Result<Arc<CudaModule>> {
    let cache = MODULE_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock();

    let key = (device_index, name.to_string());
    if let Some(module) = guard.get(&key) {
        return Ok(module.clone());
    }

    let ptx = cudarc::nvrtc::compile_ptx(source()).map_err(|e| {
        Error::Backend(format!("NVRTC compilation of '{name}' failed: {e:?}"))
    })?;
    let module = context.load_module(ptx)?;
    tracing::debug!(device = device_index, kernel = name, "compiled CUDA module");

    guard.insert(key, module.clone());
    Ok(module)
}

/// Get a kernel function from a loaded module
pub(crate) fn get_kernel_function(module: &Arc<CudaModule>, kernel_name: &str) -> Result<CudaFunction> {
    module.load_function(kernel_name).map_err(|e| {
        Error::Backend(format!("kernel '{kernel_name}' not found in module: {e:?}"))
    })
}

// ============================================================================
// Launch Configuration
// ============================================================================

/// Threads per block for segment kernels
pub(crate) const BLOCK_SIZE: u32 = 256;

/// Upper bound on blocks per launch; the kernels grid-stride past it
pub(crate) const MAX_GRID_SIZE: u32 = 65_535;

/// 1D launch covering `threads` threads, capped at `MAX_GRID_SIZE` blocks
pub(crate) fn launch_config(threads: usize) -> LaunchConfig {
    let blocks = threads.div_ceil(BLOCK_SIZE as usize).clamp(1, MAX_GRID_SIZE as usize);
    LaunchConfig {
        grid_dim: (blocks as u32, 1, 1),
        block_dim: (BLOCK_SIZE, 1, 1),
        shared_mem_bytes: 0,
    }
}
