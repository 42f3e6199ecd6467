//! One warp per segment

use super::{KernelKind, SegmentReductionKernel, reduce_with_lanes};
use crate::error::Result;
use crate::runtime::ExecutionContext;
use crate::segments::SegmentsView;
use std::ops::Range;

/// Splits each segment across the context's warp
///
/// Lane `k` of the warp folds slots `k, k + W, ...`; the `W` partials are
/// combined with a shuffle-down tree. Host contexts emulate the lanes inside
/// one worker.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VectorKernel;

impl SegmentReductionKernel for VectorKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Vector
    }

    fn init<V: SegmentsView>(&mut self, _view: &V) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}

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
        reduce_with_lanes(
            ctx,
            view,
            range,
            ctx.warp_size(),
            &fetch,
            &reduce,
            &keep,
            identity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuClient;
    use crate::segments::{BiEllpack, Segments};
    use std::sync::Mutex;

    #[test]
    fn test_integer_sums_match_sizes() {
        let sizes = [40i32, 0, 1, 33, 64, 7];
        let layout = BiEllpack::<i32>::from_sizes(&sizes).unwrap();
        let out = Mutex::new(vec![0usize; sizes.len()]);
        VectorKernel
            .reduce_all_segments(
                &CpuClient::default(),
                &layout.view(),
                |_, _, _, pad| usize::from(!pad),
                |a, b| a + b,
                |s, v| out.lock().unwrap()[s] = v,
                0,
            )
            .unwrap();
        let expected: Vec<usize> = sizes.iter().map(|&s| s as usize).collect();
        assert_eq!(out.into_inner().unwrap(), expected);
    }

    #[test]
    fn test_lane_tree_order() {
        // A polynomial hash is order-sensitive: lanes fold strided slots,
        // then the tree pairs lane k with lane k + offset.
        let csr = crate::segments::Csr::<i64>::from_sizes(&[34]).unwrap();
        let out = Mutex::new(Vec::new());
        VectorKernel
            .reduce_all_segments(
                &CpuClient::sequential(),
                &csr.view(),
                |_, l, _, _| l as u64,
                |a, b| a.wrapping_mul(31).wrapping_add(b),
                |_, v| out.lock().unwrap().push(v),
                0u64,
            )
            .unwrap();

        let mut lanes = vec![0u64; 32];
        for l in 0..34 {
            lanes[l % 32] = lanes[l % 32].wrapping_mul(31).wrapping_add(l as u64);
        }
        let mut offset = 16;
        while offset > 0 {
            for k in 0..offset {
                lanes[k] = lanes[k].wrapping_mul(31).wrapping_add(lanes[k + offset]);
            }
            offset /= 2;
        }
        assert_eq!(out.into_inner().unwrap(), vec![lanes[0]]);
    }
}
