//! Segment reduction kernels
//!
//! A reduction visits every slot of every segment in a range and folds the
//! fetched values into one result per segment:
//!
//! ```text
//! for segment in range:
//!     acc = identity
//!     for slot in segment (padding included):
//!         acc = reduce(acc, fetch(segment, local, global, padding))
//!     keep(segment, acc)
//! ```
//!
//! The kernels differ in how slots are assigned to workers:
//!
//! | Kernel | Workers per segment | Combine order |
//! |--------|---------------------|---------------|
//! | [`ScalarKernel`] | 1 | slots in order |
//! | [`VectorKernel`] | warp size | lane `k` folds slots `k, k+W, ...`, then a shuffle-down tree |
//! | [`HybridKernel`] | power of two chosen at `init` | as Vector, with fewer lanes |
//!
//! For a fixed kernel the combine order is the same on the sequential loop,
//! on the thread pool and in the generated CUDA kernels, so results only
//! differ between kernels (by floating-point rounding), never between
//! backends.

mod builtin;
mod hybrid;
mod scalar;
mod vector;

pub use builtin::{FetchKind, ReduceOp, SegmentReduction};
pub use hybrid::{HybridKernel, hybrid_threads_per_segment};
pub use scalar::ScalarKernel;
pub use vector::VectorKernel;

use super::{SegmentsView, check_range};
use crate::error::Result;
use crate::runtime::ExecutionContext;
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

/// Scheduling policy of a reduction kernel
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum KernelKind {
    /// One worker per segment
    #[default]
    Scalar,
    /// One warp per segment
    Vector,
    /// Threads per segment picked from the average segment size
    Hybrid,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar => f.write_str("scalar"),
            Self::Vector => f.write_str("vector"),
            Self::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// A segment reduction strategy
///
/// Kernels hold only scheduling parameters. `init` derives them from a view;
/// they stay fixed until the next `init` or `reset`.
pub trait SegmentReductionKernel: Send + Sync {
    /// Scheduling policy
    fn kind(&self) -> KernelKind;

    /// Derive scheduling parameters from a layout
    fn init<V: SegmentsView>(&mut self, view: &V) -> Result<()>;

    /// Forget scheduling parameters
    fn reset(&mut self);

    /// Reduce every segment in `range`
    ///
    /// `fetch(segment, local, global, padding)` is called for every slot,
    /// with `padding == true` for slots past the segment's size; it should
    /// return `identity` for those. `reduce` must be associative and
    /// commutative. `keep(segment, result)` runs exactly once per segment,
    /// possibly concurrently for different segments. Segments without slots
    /// yield `identity`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `range` extends past the view's segments.
    #[allow(clippy::too_many_arguments)]
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
        Keep: Fn(usize, T) + Sync + Send;

    /// Reduce every segment of the view
    fn reduce_all_segments<C, V, T, Fetch, Reduce, Keep>(
        &self,
        ctx: &C,
        view: &V,
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
        self.reduce_segments(ctx, view, 0..view.segments_count(), fetch, reduce, keep, identity)
    }
}

/// Any of the three kernels
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReductionKernel {
    /// Scalar kernel
    Scalar(ScalarKernel),
    /// Vector kernel
    Vector(VectorKernel),
    /// Hybrid kernel
    Hybrid(HybridKernel),
}

impl ReductionKernel {
    /// Uninitialized kernel of the given kind
    pub fn new(kind: KernelKind) -> Self {
        match kind {
            KernelKind::Scalar => Self::Scalar(ScalarKernel),
            KernelKind::Vector => Self::Vector(VectorKernel),
            KernelKind::Hybrid => Self::Hybrid(HybridKernel::new()),
        }
    }

    /// Kernel of the given kind, initialized for `view`
    pub fn for_view<V: SegmentsView>(kind: KernelKind, view: &V) -> Result<Self> {
        let mut kernel = Self::new(kind);
        kernel.init(view)?;
        Ok(kernel)
    }
}

impl Default for ReductionKernel {
    fn default() -> Self {
        Self::new(KernelKind::Scalar)
    }
}

impl SegmentReductionKernel for ReductionKernel {
    fn kind(&self) -> KernelKind {
        match self {
            Self::Scalar(k) => k.kind(),
            Self::Vector(k) => k.kind(),
            Self::Hybrid(k) => k.kind(),
        }
    }

    fn init<V: SegmentsView>(&mut self, view: &V) -> Result<()> {
        match self {
            Self::Scalar(k) => k.init(view),
            Self::Vector(k) => k.init(view),
            Self::Hybrid(k) => k.init(view),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Scalar(k) => k.reset(),
            Self::Vector(k) => k.reset(),
            Self::Hybrid(k) => k.reset(),
        }
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
        match self {
            Self::Scalar(k) => k.reduce_segments(ctx, view, range, fetch, reduce, keep, identity),
            Self::Vector(k) => k.reduce_segments(ctx, view, range, fetch, reduce, keep, identity),
            Self::Hybrid(k) => k.reduce_segments(ctx, view, range, fetch, reduce, keep, identity),
        }
    }
}

/// Reduce `range` with a freshly initialized kernel of `kind`
#[allow(clippy::too_many_arguments)]
pub fn reduce_segments<C, V, T, Fetch, Reduce, Keep>(
    kind: KernelKind,
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
    ReductionKernel::for_view(kind, view)?.reduce_segments(
        ctx, view, range, fetch, reduce, keep, identity,
    )
}

/// Fold every slot of each segment across `lanes` partials
///
/// Lane `k` folds local slots `k, k + lanes, ...` in order; the partials are
/// then combined pairwise with offsets `lanes / 2, ..., 1`, the same tree a
/// warp shuffle-down reduction builds. `lanes` must be a power of two.
#[allow(clippy::too_many_arguments)]
pub(crate) fn reduce_with_lanes<C, V, T, Fetch, Reduce, Keep>(
    ctx: &C,
    view: &V,
    range: Range<usize>,
    lanes: usize,
    fetch: &Fetch,
    reduce: &Reduce,
    keep: &Keep,
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
    check_range(&range, view.segments_count())?;
    debug_assert!(lanes.is_power_of_two());

    ctx.parallel_for(range, |segment| {
        let descriptor = view.segment(segment);
        let mut partials: SmallVec<[T; 32]> = SmallVec::from_elem(identity, lanes);
        for slot in descriptor.slots() {
            let lane = slot.local % lanes;
            partials[lane] = reduce(
                partials[lane],
                fetch(segment, slot.local, slot.global, slot.padding),
            );
        }
        let mut offset = lanes / 2;
        while offset > 0 {
            for k in 0..offset {
                partials[k] = reduce(partials[k], partials[k + offset]);
            }
            offset /= 2;
        }
        keep(segment, partials[0]);
    });
    ctx.synchronize()
}
