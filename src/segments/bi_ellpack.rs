//! BiEllpack segments
//!
//! Segments are cut into strips of `W` (one warp). Inside a strip they are
//! ranked by descending size (stable, so equal sizes keep their order) and
//! the rank is recorded in `segments_permutation`. A strip is split into
//! `log2(W) + 1` groups of heights `W, W/2, ..., 1`; group `g` holds the
//! rows with rank `< W >> g` and is only as wide as those rows need:
//!
//! ```text
//! cumulative(g) = size of the row ranked (W >> g) / 2
//! width(g)      = cumulative(g) - cumulative(g - 1)
//! ```
//!
//! A row's capacity is the sum of the widths of the groups it belongs to,
//! which is at least its size. Summed over a strip, the slots never exceed
//! twice the stored elements.

use super::{
    ElementsOrganization, LayoutState, SegmentGroup, SegmentView, Segments, SegmentsKind,
    SegmentsView, WARP_SIZE,
};
use crate::dtype::SegmentIndex;
use crate::dtype::index::{checked_mul, convert_index_vec, checked_prefix_sum, sizes_to_usize, to_index_vec};
use crate::error::{Error, Result};
use crate::io::{Header, read_array, write_array};
use smallvec::SmallVec;
use std::io::{Read, Write};

/// BiEllpack segments
#[derive(Clone, Debug)]
pub struct BiEllpack<I: SegmentIndex> {
    sizes: Vec<I>,
    segments_permutation: Vec<I>,
    group_pointers: Vec<I>,
    strip_size: usize,
    organization: ElementsOrganization,
    state: LayoutState,
}

impl<I: SegmentIndex> Default for BiEllpack<I> {
    fn default() -> Self {
        Self::new(ElementsOrganization::RowMajor)
    }
}

impl<I: SegmentIndex> BiEllpack<I> {
    /// Create an uninitialized layout with warp-sized strips
    pub fn new(organization: ElementsOrganization) -> Self {
        Self {
            sizes: Vec::new(),
            segments_permutation: Vec::new(),
            group_pointers: Vec::new(),
            strip_size: WARP_SIZE,
            organization,
            state: LayoutState::Uninitialized,
        }
    }

    /// Create an uninitialized layout with a custom strip size
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `strip_size` is a power of two.
    pub fn with_strip_size(organization: ElementsOrganization, strip_size: usize) -> Result<Self> {
        if !strip_size.is_power_of_two() {
            return Err(Error::invalid_argument(
                "strip_size",
                format!("{strip_size} is not a power of two"),
            ));
        }
        Ok(Self {
            strip_size,
            ..Self::new(organization)
        })
    }

    /// Build from sizes with an explicit organization
    pub fn from_sizes_with(sizes: &[I], organization: ElementsOrganization) -> Result<Self> {
        let mut layout = Self::new(organization);
        layout.set_segments_sizes(sizes)?;
        Ok(layout)
    }

    /// Segments per strip
    pub fn strip_size(&self) -> usize {
        self.strip_size
    }

    /// Groups per strip, `log2(strip_size) + 1`
    pub fn groups_per_strip(&self) -> usize {
        groups_per_strip(self.strip_size)
    }

    /// Permuted position of every segment (`strip * W + rank`)
    pub fn segments_permutation(&self) -> &[I] {
        &self.segments_permutation
    }

    /// Prefix sum of group storage (`strips * groups + 1` entries)
    pub fn group_pointers(&self) -> &[I] {
        &self.group_pointers
    }

    /// Value-preserving conversion to another index type
    pub fn convert<J: SegmentIndex>(&self) -> Result<BiEllpack<J>> {
        Ok(BiEllpack {
            sizes: convert_index_vec(&self.sizes, "segment size")?,
            segments_permutation: convert_index_vec(&self.segments_permutation, "permutation")?,
            group_pointers: convert_index_vec(&self.group_pointers, "group pointer")?,
            strip_size: self.strip_size,
            organization: self.organization,
            state: self.state,
        })
    }

    /// Number of groups segment `segment` has slots in
    pub fn active_groups_count(&self, segment: usize) -> Result<usize> {
        super::check_segment(segment, self.sizes.len())?;
        let view = self.view();
        Ok(view.active_groups(view.rank(segment)))
    }
}

#[inline]
fn groups_per_strip(strip_size: usize) -> usize {
    strip_size.trailing_zeros() as usize + 1
}

/// Geometry of one set of sizes, computed before anything is swapped in
struct Geometry {
    permutation: Vec<usize>,
    group_pointers: Vec<usize>,
}

fn compute_geometry<I: SegmentIndex>(sizes: &[usize], strip_size: usize) -> Result<Geometry> {
    let groups = groups_per_strip(strip_size);
    let strips = sizes.len().div_ceil(strip_size);
    let mut permutation = vec![0usize; sizes.len()];
    let mut group_storage = Vec::with_capacity(strips * groups);

    for strip in 0..strips {
        let first = strip * strip_size;
        let last = (first + strip_size).min(sizes.len());

        let mut order: Vec<usize> = (first..last).collect();
        order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]));
        for (rank, &segment) in order.iter().enumerate() {
            permutation[segment] = first + rank;
        }

        // Size of the row at `rank`; ranks past the strip's rows are empty.
        let ranked = |rank: usize| order.get(rank).map_or(0, |&s| sizes[s]);

        let mut previous = 0;
        for g in 0..groups {
            let height = strip_size >> g;
            let cumulative = ranked(height / 2);
            let width = cumulative - previous;
            group_storage.push(checked_mul::<I>(height, width, "group storage")?);
            previous = cumulative;
        }
    }

    let group_pointers = checked_prefix_sum(&group_storage, "storage size")?;
    Ok(Geometry {
        permutation,
        group_pointers,
    })
}

impl<I: SegmentIndex, J: SegmentIndex> PartialEq<BiEllpack<J>> for BiEllpack<I> {
    fn eq(&self, other: &BiEllpack<J>) -> bool {
        self.state == other.state
            && self.organization == other.organization
            && self.strip_size == other.strip_size
            && self.sizes.len() == other.sizes.len()
            && self
                .sizes
                .iter()
                .zip(&other.sizes)
                .all(|(a, b)| a.try_as_usize() == b.try_as_usize())
    }
}

impl<I: SegmentIndex> Eq for BiEllpack<I> {}

/// Borrowed view of [`BiEllpack`]
#[derive(Copy, Clone, Debug)]
pub struct BiEllpackView<'a, I> {
    sizes: &'a [I],
    segments_permutation: &'a [I],
    group_pointers: &'a [I],
    strip_size: usize,
    groups: usize,
    organization: ElementsOrganization,
}

impl<I: SegmentIndex> BiEllpackView<'_, I> {
    #[inline]
    fn rank(&self, segment: usize) -> usize {
        self.segments_permutation[segment].as_usize() % self.strip_size
    }

    /// Count of groups `g` with `W >> g > rank`, found by bisection
    ///
    /// Recomputed on every call rather than cached per segment.
    #[inline]
    fn active_groups(&self, rank: usize) -> usize {
        let (mut lo, mut hi) = (0, self.groups);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.strip_size >> mid > rank {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// (begin, width, height) of group `g` in the strip of `segment`
    #[inline]
    fn group(&self, segment: usize, g: usize) -> (usize, usize, usize) {
        let pointer = (segment / self.strip_size) * self.groups + g;
        let begin = self.group_pointers[pointer].as_usize();
        let end = self.group_pointers[pointer + 1].as_usize();
        let height = self.strip_size >> g;
        (begin, (end - begin) / height, height)
    }

    #[inline]
    fn slot(&self, begin: usize, width: usize, height: usize, rank: usize, k: usize) -> usize {
        match self.organization {
            ElementsOrganization::RowMajor => begin + rank * width + k,
            ElementsOrganization::ColumnMajor => begin + rank + k * height,
        }
    }
}

impl<I: SegmentIndex> SegmentsView for BiEllpackView<'_, I> {
    #[inline]
    fn segments_count(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    fn storage_size(&self) -> usize {
        self.group_pointers.last().map_or(0, |p| p.as_usize())
    }

    #[inline]
    fn segment_size(&self, segment: usize) -> usize {
        self.sizes[segment].as_usize()
    }

    /// Walks the active groups, O(log W)
    fn segment_capacity(&self, segment: usize) -> usize {
        let active = self.active_groups(self.rank(segment));
        (0..active).map(|g| self.group(segment, g).1).sum()
    }

    fn global_index(&self, segment: usize, local: usize) -> usize {
        let rank = self.rank(segment);
        let active = self.active_groups(rank);
        let mut rest = local;
        for g in 0..active {
            let (begin, width, height) = self.group(segment, g);
            if rest < width {
                return self.slot(begin, width, height, rank, rest);
            }
            rest -= width;
        }
        debug_assert!(false, "slot {local} beyond capacity of segment {segment}");
        self.storage_size()
    }

    fn segment(&self, segment: usize) -> SegmentView {
        let rank = self.rank(segment);
        let active = self.active_groups(rank);
        let groups: SmallVec<[SegmentGroup; 6]> = (0..active)
            .map(|g| self.group(segment, g))
            .filter(|&(_, width, _)| width > 0)
            .map(|(begin, width, height)| {
                let (first, step) = match self.organization {
                    ElementsOrganization::RowMajor => (begin + rank * width, 1),
                    ElementsOrganization::ColumnMajor => (begin + rank, height),
                };
                SegmentGroup {
                    begin: first,
                    width,
                    step,
                }
            })
            .collect();
        SegmentView::grouped(segment, self.segment_size(segment), groups)
    }
}

impl<I: SegmentIndex> Segments<I> for BiEllpack<I> {
    type View<'a> = BiEllpackView<'a, I>;

    fn kind(&self) -> SegmentsKind {
        SegmentsKind::BiEllpack
    }

    fn organization(&self) -> ElementsOrganization {
        self.organization
    }

    fn state(&self) -> LayoutState {
        self.state
    }

    fn set_segments_sizes(&mut self, sizes: &[I]) -> Result<()> {
        let counts = sizes_to_usize(sizes)?;
        let geometry = compute_geometry::<I>(&counts, self.strip_size)?;
        let group_pointers = to_index_vec::<I>(&geometry.group_pointers, "storage size")?;
        let permutation = to_index_vec::<I>(&geometry.permutation, "segment permutation")?;

        tracing::debug!(
            segments = counts.len(),
            strips = counts.len().div_ceil(self.strip_size),
            storage = geometry.group_pointers.last().copied().unwrap_or(0),
            "sized BiEllpack layout"
        );
        self.sizes = sizes.to_vec();
        self.segments_permutation = permutation;
        self.group_pointers = group_pointers;
        self.state = LayoutState::Sized;
        Ok(())
    }

    fn reset(&mut self) {
        self.sizes.clear();
        self.segments_permutation.clear();
        self.group_pointers.clear();
        self.state = LayoutState::Uninitialized;
    }

    fn view(&self) -> BiEllpackView<'_, I> {
        BiEllpackView {
            sizes: &self.sizes,
            segments_permutation: &self.segments_permutation,
            group_pointers: &self.group_pointers,
            strip_size: self.strip_size,
            groups: groups_per_strip(self.strip_size),
            organization: self.organization,
        }
    }

    fn header_params(&self) -> [u64; 3] {
        [self.strip_size as u64, 0, 0]
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_array(writer, &self.sizes)?;
        write_array(writer, &self.segments_permutation)?;
        write_array(writer, &self.group_pointers)
    }

    fn read_body<R: Read>(header: &Header, reader: &mut R) -> Result<Self> {
        header.expect_layout::<I>(SegmentsKind::BiEllpack)?;
        let mut layout = Self::with_strip_size(header.organization, header.param(0)?)?;
        let sizes: Vec<I> = read_array(reader)?;
        let permutation: Vec<I> = read_array(reader)?;
        let group_pointers: Vec<I> = read_array(reader)?;
        layout.set_segments_sizes(&sizes)?;
        if layout.segments_permutation != permutation || layout.group_pointers != group_pointers {
            return Err(Error::invalid_argument(
                "bi_ellpack",
                "stored permutation or group pointers do not match the stored sizes",
            ));
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_strip_of_four() {
        let mut layout =
            BiEllpack::<i32>::with_strip_size(ElementsOrganization::RowMajor, 4).unwrap();
        layout.set_segments_sizes(&[1, 4, 0, 2]).unwrap();

        // ranks by descending size: seg1 (4), seg3 (2), seg0 (1), seg2 (0)
        assert_eq!(layout.segments_permutation(), &[2, 0, 3, 1]);
        // groups: h=4 w=d(2)=1, h=2 w=d(1)-1=1, h=1 w=d(0)-2=2
        assert_eq!(layout.group_pointers(), &[0, 4, 6, 8]);
        assert_eq!(layout.storage_size(), 8);

        assert_eq!(layout.segment_capacity(1).unwrap(), 4);
        assert_eq!(layout.segment_capacity(3).unwrap(), 2);
        assert_eq!(layout.segment_capacity(2).unwrap(), 1);
        assert_eq!(layout.active_groups_count(1).unwrap(), 3);
        assert_eq!(layout.active_groups_count(0).unwrap(), 1);

        // segment 1 (rank 0): group 0 slot 0, group 1 slot 4, group 2 slots 6 and 7
        let view = layout.view();
        let globals: Vec<_> = view.segment(1).iter().map(|e| e.global).collect();
        assert_eq!(globals, vec![0, 4, 6, 7]);
        assert_eq!(layout.global_index(3, 1).unwrap(), 5);
    }

    #[test]
    fn test_bijection_and_bound() {
        let sizes: Vec<u32> = (0..77).map(|i| (i * 37 % 23) as u32).collect();
        for organization in [ElementsOrganization::RowMajor, ElementsOrganization::ColumnMajor] {
            let layout = BiEllpack::from_sizes_with(&sizes, organization).unwrap();
            let view = layout.view();
            let mut seen = HashSet::new();
            for s in 0..sizes.len() {
                assert_eq!(view.segment_size(s), sizes[s] as usize);
                assert!(view.segment_capacity(s) >= view.segment_size(s));
                for e in view.segment(s).slots() {
                    assert!(e.global < layout.storage_size());
                    assert!(seen.insert(e.global), "collision at {}", e.global);
                    assert_eq!(view.global_index(s, e.local), e.global);
                }
            }
            let total: usize = sizes.iter().map(|&s| s as usize).sum();
            assert!(layout.storage_size() <= 2 * total);
        }
    }

    #[test]
    fn test_convert_keeps_geometry() {
        let layout = BiEllpack::<i64>::from_sizes_with(&[3, 0, 7, 1], ElementsOrganization::ColumnMajor)
            .unwrap();
        let narrow: BiEllpack<u32> = layout.convert().unwrap();
        assert!(narrow == layout);
        assert_eq!(narrow.storage_size(), layout.storage_size());
        assert_eq!(narrow.global_index(2, 5).unwrap() as i64, layout.global_index(2, 5).unwrap());

        let empty = BiEllpack::<i64>::new(ElementsOrganization::RowMajor);
        assert_eq!(empty.convert::<i32>().unwrap().state(), LayoutState::Uninitialized);
    }

    #[test]
    fn test_non_power_of_two_strip_rejected() {
        assert!(BiEllpack::<i32>::with_strip_size(ElementsOrganization::RowMajor, 24).is_err());
    }
}
