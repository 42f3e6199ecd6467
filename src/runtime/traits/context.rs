//! Execution context shared by every host backend

use crate::error::Result;
use crate::runtime::WARP_SIZE;
use std::ops::Range;

/// The capability a segment algorithm needs from a backend
///
/// Segment algorithms are written once against this trait instead of being
/// duplicated per device. A context splits an index range into sub-ranges and
/// runs a closure on each, possibly concurrently; sub-ranges never overlap
/// and together cover the input exactly once.
///
/// Closures receive plain indices, so the same `fetch`/`reduce`/`keep`
/// closures run unchanged on the sequential loop and on the thread pool.
pub trait ExecutionContext: Send + Sync {
    /// Backend name used in logs and errors
    fn backend_name(&self) -> &'static str;

    /// Width of the lane group a Vector kernel assigns to one segment
    fn warp_size(&self) -> usize {
        WARP_SIZE
    }

    /// Returns true if sub-ranges may run concurrently
    fn is_parallel(&self) -> bool;

    /// Run `f` over disjoint sub-ranges covering `range`
    ///
    /// Returns after every sub-range has completed.
    fn submit_range<F>(&self, range: Range<usize>, f: F)
    where
        F: Fn(Range<usize>) + Sync + Send;

    /// Run `f` once for every index in `range`
    fn parallel_for<F>(&self, range: Range<usize>, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        self.submit_range(range, |chunk| chunk.for_each(&f));
    }

    /// Wait for outstanding work
    ///
    /// Host contexts complete work inside `submit_range`, so this is a no-op
    /// for them.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
