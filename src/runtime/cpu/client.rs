//! CPU client and parallelism configuration

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::error::{Error, Result};
use crate::runtime::{ExecutionContext, RuntimeClient};
use std::ops::Range;
#[cfg(feature = "rayon")]
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Default minimum number of indices a rayon task handles
const DEFAULT_MIN_LEN: usize = 32;

/// Sub-ranges handed to rayon per worker thread
#[cfg(feature = "rayon")]
const TASKS_PER_THREAD: usize = 4;

/// Host parallelism knobs
///
/// - `num_threads`: `None` uses the global rayon pool, `Some(1)` runs the
///   sequential loop, `Some(n)` builds a dedicated pool of `n` threads.
/// - `min_len`: smallest sub-range handed to a single task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParallelismConfig {
    /// Worker thread count
    pub num_threads: Option<usize>,
    /// Minimum indices per task
    pub min_len: Option<usize>,
}

impl ParallelismConfig {
    /// Configuration for the sequential reference loop
    pub const fn sequential() -> Self {
        Self {
            num_threads: Some(1),
            min_len: None,
        }
    }

    /// Configuration for a dedicated pool of `num_threads` workers
    pub const fn threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            min_len: None,
        }
    }

    /// Set the minimum sub-range length
    pub const fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = Some(min_len);
        self
    }
}

/// CPU client for operation dispatch
///
/// Implements [`ExecutionContext`], so every segment kernel and traversal
/// accepts it directly.
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    config: ParallelismConfig,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuClient {
    /// Create a new CPU client using the global rayon pool
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            config: ParallelismConfig::default(),
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    /// Create a client that runs everything on the calling thread
    pub fn sequential() -> Self {
        Self {
            device: CpuDevice::new(),
            config: ParallelismConfig::sequential(),
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    /// Create a client with explicit parallelism settings
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero thread count or zero `min_len`,
    /// and `Backend` if the thread pool cannot be built.
    pub fn with_parallelism(device: CpuDevice, config: ParallelismConfig) -> Result<Self> {
        if config.num_threads == Some(0) {
            return Err(Error::invalid_argument(
                "num_threads",
                "thread count must be at least 1",
            ));
        }
        if config.min_len == Some(0) {
            return Err(Error::invalid_argument(
                "min_len",
                "minimum task length must be at least 1",
            ));
        }

        #[cfg(feature = "rayon")]
        let pool = match config.num_threads {
            Some(n) if n > 1 => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("segmr-cpu-{i}"))
                    .build()
                    .map_err(|e| Error::Backend(format!("failed to build thread pool: {e}")))?;
                tracing::debug!(threads = n, "built dedicated CPU thread pool");
                Some(Arc::new(pool))
            }
            _ => None,
        };

        Ok(Self {
            device,
            config,
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// The settings this client was built with
    pub fn parallelism(&self) -> ParallelismConfig {
        self.config
    }

    /// Returns true if work runs on the calling thread only
    pub fn is_sequential(&self) -> bool {
        cfg!(not(feature = "rayon")) || self.config.num_threads == Some(1)
    }

    /// Minimum number of indices per rayon task
    #[inline]
    pub fn rayon_min_len(&self) -> usize {
        self.config.min_len.unwrap_or(DEFAULT_MIN_LEN)
    }

    /// Run `f` inside this client's thread pool
    ///
    /// Without a dedicated pool, `f` runs on the caller (and any rayon calls
    /// inside it use the global pool).
    pub fn install_parallelism<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.pool {
            return pool.install(f);
        }
        f()
    }
}

impl Default for CpuClient {
    fn default() -> Self {
        Self::new(CpuDevice::new())
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // CPU operations are synchronous, nothing to do
        Ok(())
    }
}

impl ExecutionContext for CpuClient {
    fn backend_name(&self) -> &'static str {
        if self.is_sequential() {
            "cpu:seq"
        } else {
            "cpu"
        }
    }

    fn is_parallel(&self) -> bool {
        !self.is_sequential()
    }

    fn submit_range<F>(&self, range: Range<usize>, f: F)
    where
        F: Fn(Range<usize>) + Sync + Send,
    {
        if range.is_empty() {
            return;
        }

        #[cfg(feature = "rayon")]
        if !self.is_sequential() {
            let min_len = self.rayon_min_len();
            self.install_parallelism(|| {
                let len = range.len();
                let target = rayon::current_num_threads() * TASKS_PER_THREAD;
                let chunk = len.div_ceil(target.max(1)).max(min_len);
                let tasks = len.div_ceil(chunk);
                (0..tasks).into_par_iter().for_each(|task| {
                    let start = range.start + task * chunk;
                    let end = (start + chunk).min(range.end);
                    f(start..end);
                });
            });
            return;
        }

        f(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_zero_threads_rejected() {
        let err = CpuClient::with_parallelism(CpuDevice::new(), ParallelismConfig::threads(0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "num_threads", .. }));
    }

    #[test]
    fn test_submit_range_covers_every_index_once() {
        let clients = [
            CpuClient::sequential(),
            CpuClient::with_parallelism(
                CpuDevice::new(),
                ParallelismConfig::threads(3).with_min_len(5),
            )
            .unwrap(),
        ];
        for client in &clients {
            let hits: Vec<AtomicUsize> = (0..103).map(|_| AtomicUsize::new(0)).collect();
            client.submit_range(3..103, |chunk| {
                for i in chunk {
                    hits[i].fetch_add(1, Ordering::Relaxed);
                }
            });
            for (i, h) in hits.iter().enumerate() {
                let expected = usize::from(i >= 3);
                assert_eq!(h.load(Ordering::Relaxed), expected, "index {i}");
            }
        }
    }

    #[test]
    fn test_sequential_backend_name() {
        let client = CpuClient::sequential();
        assert!(client.is_sequential());
        assert_eq!(client.backend_name(), "cpu:seq");
        assert!(ExecutionContext::synchronize(&client).is_ok());
    }
}
