//! One worker per segment

use super::{KernelKind, SegmentReductionKernel};
use crate::error::Result;
use crate::runtime::ExecutionContext;
use crate::segments::{SegmentsView, check_range};
use std::ops::Range;

/// Folds each segment's slots in local order on a single worker
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScalarKernel;

impl SegmentReductionKernel for ScalarKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Scalar
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
        check_range(&range, view.segments_count())?;
        ctx.parallel_for(range, |segment| {
            let result = view
                .segment(segment)
                .slots()
                .fold(identity, |acc, slot| {
                    reduce(acc, fetch(segment, slot.local, slot.global, slot.padding))
                });
            keep(segment, result);
        });
        ctx.synchronize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuClient;
    use crate::segments::{Csr, Ellpack, Segments};
    use std::sync::Mutex;

    #[test]
    fn test_segment_sums_csr() {
        let csr = Csr::<i32>::from_sizes(&[3, 0, 2]).unwrap();
        let data: Vec<f64> = (0..5).map(|v| v as f64).collect();
        let out = Mutex::new(vec![-1.0; 3]);
        ScalarKernel
            .reduce_all_segments(
                &CpuClient::sequential(),
                &csr.view(),
                |_, _, g, pad| if pad { 0.0 } else { data[g] },
                |a, b| a + b,
                |s, v| out.lock().unwrap()[s] = v,
                0.0,
            )
            .unwrap();
        assert_eq!(out.into_inner().unwrap(), vec![3.0, 0.0, 7.0]);
    }

    #[test]
    fn test_padding_reported() {
        let ell = Ellpack::<i64>::from_sizes(&[1, 3]).unwrap();
        let pads = Mutex::new(Vec::new());
        ScalarKernel
            .reduce_segments(
                &CpuClient::sequential(),
                &ell.view(),
                0..1,
                |s, l, _, pad| {
                    pads.lock().unwrap().push((s, l, pad));
                    0u32
                },
                |a, b| a + b,
                |_, _| {},
                0,
            )
            .unwrap();
        assert_eq!(
            pads.into_inner().unwrap(),
            vec![(0, 0, false), (0, 1, true), (0, 2, true)]
        );
    }

    #[test]
    fn test_range_past_end_rejected() {
        let csr = Csr::<u32>::from_sizes(&[1]).unwrap();
        let result = ScalarKernel.reduce_segments(
            &CpuClient::sequential(),
            &csr.view(),
            0..2,
            |_, _, _, _| 0,
            |a, b| a + b,
            |_, _| {},
            0,
        );
        assert!(result.is_err());
    }
}
