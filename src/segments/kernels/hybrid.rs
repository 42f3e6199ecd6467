//! Threads per segment sized to the average segment

use super::{KernelKind, SegmentReductionKernel, reduce_with_lanes};
use crate::error::{Error, Result};
use crate::runtime::{ExecutionContext, WARP_SIZE};
use crate::segments::SegmentsView;
use std::ops::Range;

/// Lanes per segment for a layout holding `total` elements in `segments`
/// segments: the smallest power of two not below the average, clamped to
/// `[1, warp]`
pub fn hybrid_threads_per_segment(total: usize, segments: usize, warp: usize) -> usize {
    if segments == 0 {
        return 1;
    }
    total
        .div_ceil(segments)
        .max(1)
        .checked_next_power_of_two()
        .unwrap_or(usize::MAX)
        .min(warp.max(1))
}

/// Lanes sized to the layout's average segment
///
/// Short segments get few lanes, so a warp serves several segments at once
/// on the device; long segments get the whole warp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HybridKernel {
    threads_per_segment: Option<usize>,
    segments_count: usize,
    warp_size: usize,
}

impl Default for HybridKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridKernel {
    /// Uninitialized kernel for the default warp width
    pub fn new() -> Self {
        Self::with_warp_size(WARP_SIZE)
    }

    /// Uninitialized kernel clamping lanes to `warp_size`
    pub fn with_warp_size(warp_size: usize) -> Self {
        Self {
            threads_per_segment: None,
            segments_count: 0,
            warp_size: warp_size.max(1),
        }
    }

    /// Lanes chosen by the last `init`
    pub fn threads_per_segment(&self) -> Option<usize> {
        self.threads_per_segment
    }

    fn lanes_for(&self, segments: usize) -> Result<usize> {
        let lanes = self.threads_per_segment.ok_or_else(|| {
            Error::invalid_argument("kernel", "hybrid kernel used before init")
        })?;
        if segments != self.segments_count {
            return Err(Error::invalid_argument(
                "view",
                format!(
                    "hybrid kernel initialised for {} segments, view has {segments}",
                    self.segments_count
                ),
            ));
        }
        Ok(lanes)
    }
}

impl SegmentReductionKernel for HybridKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Hybrid
    }

    fn init<V: SegmentsView>(&mut self, view: &V) -> Result<()> {
        let segments = view.segments_count();
        let total = view.total_size();
        let lanes = hybrid_threads_per_segment(total, segments, self.warp_size);
        tracing::debug!(segments, total, lanes, "initialised hybrid kernel");
        self.threads_per_segment = Some(lanes);
        self.segments_count = segments;
        Ok(())
    }

    fn reset(&mut self) {
        self.threads_per_segment = None;
        self.segments_count = 0;
    }

    fn reduce_segments<C, V, T, Fetch, Reduce, Keep>(
        &self,
        ctx: &C,
        view: &V,
        range: Range<usize>,
        fetch: Fetch,
        reduce: Reduce,
        keep: Keep,
        identity: T,
    ) -> Result<()>
    where
        C: ExecutionContext,
        V: SegmentsView,
        T: Copy + Send + Sync,
        Fetch: Fn(usize, usize, usize, bool) -> T + Sync + Send,
        Reduce: Fn(T, T) -> T + Sync + Send,
        Keep: Fn(usize, T) + Sync + Send,
    {
        let lanes = self.lanes_for(view.segments_count())?;
        reduce_with_lanes(ctx, view, range, lanes, &fetch, &reduce, &keep, identity)
    }
}
