//! SlicedEllpack segments: Ellpack padding applied per slice

use super::{
    ElementsOrganization, LayoutState, SegmentView, Segments, SegmentsKind, SegmentsView, WARP_SIZE,
};
use crate::dtype::SegmentIndex;
use crate::dtype::index::{checked_mul, convert_index_vec, checked_prefix_sum, sizes_to_usize, to_index_vec};
use crate::error::{Error, Result};
use crate::io::{Header, read_array, write_array};
use std::io::{Read, Write};

/// SlicedEllpack segments
///
/// Segments are cut into slices of `slice_size` consecutive segments; each
/// slice is padded to its own widest segment. `slice_offsets` is the prefix
/// sum of `slice_size * width(slice)`.
#[derive(Clone, Debug)]
pub struct SlicedEllpack<I: SegmentIndex> {
    sizes: Vec<I>,
    slice_offsets: Vec<I>,
    slice_size: usize,
    organization: ElementsOrganization,
    state: LayoutState,
}

impl<I: SegmentIndex> Default for SlicedEllpack<I> {
    fn default() -> Self {
        Self::new(ElementsOrganization::RowMajor)
    }
}

impl<I: SegmentIndex> SlicedEllpack<I> {
    /// Create an uninitialized layout with slices of one warp
    pub fn new(organization: ElementsOrganization) -> Self {
        Self {
            sizes: Vec::new(),
            slice_offsets: Vec::new(),
            slice_size: WARP_SIZE,
            organization,
            state: LayoutState::Uninitialized,
        }
    }

    /// Create an uninitialized layout with a custom slice size
    pub fn with_slice_size(organization: ElementsOrganization, slice_size: usize) -> Result<Self> {
        if slice_size == 0 {
            return Err(Error::invalid_argument("slice_size", "must be at least 1"));
        }
        Ok(Self {
            slice_size,
            ..Self::new(organization)
        })
    }

    /// Build from sizes with an explicit organization
    pub fn from_sizes_with(sizes: &[I], organization: ElementsOrganization) -> Result<Self> {
        let mut layout = Self::new(organization);
        layout.set_segments_sizes(sizes)?;
        Ok(layout)
    }

    /// Segments per slice
    pub fn slice_size(&self) -> usize {
        self.slice_size
    }

    /// Prefix sum of slice storage (`slices + 1` entries)
    pub fn slice_offsets(&self) -> &[I] {
        &self.slice_offsets
    }

    /// Value-preserving conversion to another index type
    ///
    /// # Errors
    ///
    /// `IndexOverflow` if a size or slice offset does not fit `J`.
    pub fn convert<J: SegmentIndex>(&self) -> Result<SlicedEllpack<J>> {
        Ok(SlicedEllpack {
            sizes: convert_index_vec(&self.sizes, "segment size")?,
            slice_offsets: convert_index_vec(&self.slice_offsets, "slice offset")?,
            slice_size: self.slice_size,
            organization: self.organization,
            state: self.state,
        })
    }
}

impl<I: SegmentIndex, J: SegmentIndex> PartialEq<SlicedEllpack<J>> for SlicedEllpack<I> {
    fn eq(&self, other: &SlicedEllpack<J>) -> bool {
        self.state == other.state
            && self.organization == other.organization
            && self.slice_size == other.slice_size
            && self.sizes.len() == other.sizes.len()
            && self
                .sizes
                .iter()
                .zip(&other.sizes)
                .all(|(a, b)| a.try_as_usize() == b.try_as_usize())
    }
}

impl<I: SegmentIndex> Eq for SlicedEllpack<I> {}

/// Borrowed view of [`SlicedEllpack`]
#[derive(Copy, Clone, Debug)]
pub struct SlicedEllpackView<'a, I> {
    sizes: &'a [I],
    slice_offsets: &'a [I],
    slice_size: usize,
    organization: ElementsOrganization,
}

impl<I: SegmentIndex> SlicedEllpackView<'_, I> {
    /// (slice begin, slice width, row within slice)
    #[inline]
    fn locate(&self, segment: usize) -> (usize, usize, usize) {
        let slice = segment / self.slice_size;
        let begin = self.slice_offsets[slice].as_usize();
        let end = self.slice_offsets[slice + 1].as_usize();
        (begin, (end - begin) / self.slice_size, segment % self.slice_size)
    }
}

impl<I: SegmentIndex> SegmentsView for SlicedEllpackView<'_, I> {
    #[inline]
    fn segments_count(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    fn storage_size(&self) -> usize {
        self.slice_offsets.last().map_or(0, |o| o.as_usize())
    }

    #[inline]
    fn segment_size(&self, segment: usize) -> usize {
        self.sizes[segment].as_usize()
    }

    #[inline]
    fn segment_capacity(&self, segment: usize) -> usize {
        self.locate(segment).1
    }

    #[inline]
    fn global_index(&self, segment: usize, local: usize) -> usize {
        let (begin, width, row) = self.locate(segment);
        debug_assert!(local < width);
        match self.organization {
            ElementsOrganization::RowMajor => begin + row * width + local,
            ElementsOrganization::ColumnMajor => begin + row + local * self.slice_size,
        }
    }

    fn segment(&self, segment: usize) -> SegmentView {
        let (begin, width, row) = self.locate(segment);
        let (first, step) = match self.organization {
            ElementsOrganization::RowMajor => (begin + row * width, 1),
            ElementsOrganization::ColumnMajor => (begin + row, self.slice_size),
        };
        SegmentView::strided(segment, self.segment_size(segment), width, first, step)
    }
}

impl<I: SegmentIndex> Segments<I> for SlicedEllpack<I> {
    type View<'a> = SlicedEllpackView<'a, I>;

    fn kind(&self) -> SegmentsKind {
        SegmentsKind::SlicedEllpack
    }

    fn organization(&self) -> ElementsOrganization {
        self.organization
    }

    fn state(&self) -> LayoutState {
        self.state
    }

    fn set_segments_sizes(&mut self, sizes: &[I]) -> Result<()> {
        let counts = sizes_to_usize(sizes)?;
        let slice_storage = counts
            .chunks(self.slice_size)
            .map(|slice| {
                let width = slice.iter().copied().max().unwrap_or(0);
                checked_mul::<I>(self.slice_size, width, "slice storage")
            })
            .collect::<Result<Vec<_>>>()?;
        let prefix = checked_prefix_sum(&slice_storage, "storage size")?;
        let slice_offsets = to_index_vec::<I>(&prefix, "storage size")?;

        tracing::debug!(
            segments = counts.len(),
            slices = slice_storage.len(),
            storage = prefix[slice_storage.len()],
            "sized SlicedEllpack layout"
        );
        self.sizes = sizes.to_vec();
        self.slice_offsets = slice_offsets;
        self.state = LayoutState::Sized;
        Ok(())
    }

    fn reset(&mut self) {
        self.sizes.clear();
        self.slice_offsets.clear();
        self.state = LayoutState::Uninitialized;
    }

    fn view(&self) -> SlicedEllpackView<'_, I> {
        SlicedEllpackView {
            sizes: &self.sizes,
            slice_offsets: &self.slice_offsets,
            slice_size: self.slice_size,
            organization: self.organization,
        }
    }

    fn header_params(&self) -> [u64; 3] {
        [self.slice_size as u64, 0, 0]
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_array(writer, &self.sizes)?;
        write_array(writer, &self.slice_offsets)
    }

    fn read_body<R: Read>(header: &Header, reader: &mut R) -> Result<Self> {
        header.expect_layout::<I>(SegmentsKind::SlicedEllpack)?;
        let mut layout = Self::with_slice_size(header.organization, header.param(0)?)?;
        let sizes: Vec<I> = read_array(reader)?;
        let slice_offsets: Vec<I> = read_array(reader)?;
        layout.set_segments_sizes(&sizes)?;
        if layout.slice_offsets != slice_offsets {
            return Err(Error::invalid_argument(
                "slice_offsets",
                "stored offsets do not match the stored sizes",
            ));
        }
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_slice_width() {
        let mut layout = SlicedEllpack::<i32>::with_slice_size(ElementsOrganization::RowMajor, 2)
            .unwrap();
        layout.set_segments_sizes(&[1, 3, 2, 2, 5]).unwrap();
        // slices: [1,3] -> 2*3, [2,2] -> 2*2, [5] -> 2*5
        assert_eq!(layout.slice_offsets(), &[0, 6, 10, 20]);
        assert_eq!(layout.storage_size(), 20);
        assert_eq!(layout.global_index(1, 2).unwrap(), 5);
        assert_eq!(layout.global_index(3, 1).unwrap(), 9);
        assert_eq!(layout.global_index(4, 4).unwrap(), 14);
        assert_eq!(layout.segment_capacity(0).unwrap(), 3);
    }

    #[test]
    fn test_column_major_within_slice() {
        let mut layout =
            SlicedEllpack::<u64>::with_slice_size(ElementsOrganization::ColumnMajor, 2).unwrap();
        layout.set_segments_sizes(&[1, 3]).unwrap();
        assert_eq!(layout.global_index(0, 0).unwrap(), 0);
        assert_eq!(layout.global_index(1, 0).unwrap(), 1);
        assert_eq!(layout.global_index(1, 2).unwrap(), 5);
    }
}
