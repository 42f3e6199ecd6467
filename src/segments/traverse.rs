//! Parallel traversal of segments and their elements

use super::{SegmentElement, SegmentView, SegmentsView, check_range};
use crate::error::Result;
use crate::runtime::ExecutionContext;
use std::ops::Range;

/// Call `f` for every element (`local < size`) of the segments in `range`
///
/// Segments are distributed over the context; the elements of one segment
/// are visited in local order by the same worker.
pub fn for_elements<C, V, F>(ctx: &C, view: &V, range: Range<usize>, f: F) -> Result<()>
where
    C: ExecutionContext,
    V: SegmentsView,
    F: Fn(SegmentElement) + Sync + Send,
{
    check_range(&range, view.segments_count())?;
    ctx.parallel_for(range, |segment| view.segment(segment).iter().for_each(&f));
    ctx.synchronize()
}

/// Call `f` for every slot, padding included, of the segments in `range`
pub fn for_slots<C, V, F>(ctx: &C, view: &V, range: Range<usize>, f: F) -> Result<()>
where
    C: ExecutionContext,
    V: SegmentsView,
    F: Fn(SegmentElement) + Sync + Send,
{
    check_range(&range, view.segments_count())?;
    ctx.parallel_for(range, |segment| view.segment(segment).slots().for_each(&f));
    ctx.synchronize()
}

/// Call `f` with the descriptor of every segment in `range`
pub fn for_segments<C, V, F>(ctx: &C, view: &V, range: Range<usize>, f: F) -> Result<()>
where
    C: ExecutionContext,
    V: SegmentsView,
    F: Fn(&SegmentView) + Sync + Send,
{
    check_range(&range, view.segments_count())?;
    ctx.parallel_for(range, |segment| f(&view.segment(segment)));
    ctx.synchronize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuClient;
    use crate::segments::{Ellpack, Segments};
    use std::sync::Mutex;

    #[test]
    fn test_elements_skip_padding() {
        let ell = Ellpack::<i32>::from_sizes(&[1, 3, 0]).unwrap();
        let seen = Mutex::new(Vec::new());
        for_elements(&CpuClient::default(), &ell.view(), 0..3, |e| {
            seen.lock().unwrap().push((e.segment, e.local, e.global))
        })
        .unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![(0, 0, 0), (1, 0, 3), (1, 1, 4), (1, 2, 5)]);
    }

    #[test]
    fn test_slots_cover_storage_once() {
        let ell = Ellpack::<i32>::from_sizes(&[1, 3, 0]).unwrap();
        let hits = Mutex::new(vec![0u8; ell.storage_size()]);
        for_slots(&CpuClient::default(), &ell.view(), 0..3, |e| {
            hits.lock().unwrap()[e.global] += 1
        })
        .unwrap();
        assert!(hits.into_inner().unwrap().iter().all(|&h| h == 1));
    }

    #[test]
    fn test_segments_subrange() {
        let ell = Ellpack::<i64>::from_sizes(&[2, 2, 2, 2]).unwrap();
        let seen = Mutex::new(Vec::new());
        for_segments(&CpuClient::sequential(), &ell.view(), 1..3, |s| {
            seen.lock().unwrap().push(s.index())
        })
        .unwrap();
        assert_eq!(seen.into_inner().unwrap(), vec![1, 2]);
        assert!(for_segments(&CpuClient::sequential(), &ell.view(), 2..5, |_| {}).is_err());
    }
}
