//! Ellpack segments: every segment padded to the widest one

use super::{
    DEFAULT_ALIGNMENT, ElementsOrganization, KernelGeometry, LayoutState, SegmentView, Segments,
    SegmentsKind, SegmentsView, round_up,
};
use crate::dtype::SegmentIndex;
use crate::dtype::index::{checked_mul, sizes_to_usize};
use crate::error::{Error, Result};
use crate::io::{Header, read_array, write_array};
use std::io::{Read, Write};

/// Ellpack segments
///
/// Each segment owns `width = max(size)` slots.
///
/// - Row-major: `global = segment * width + local`, storage `segments * width`
/// - Column-major: `global = segment + local * aligned`, storage
///   `aligned * width`, where `aligned` is the segment count rounded up to
///   the alignment
#[derive(Clone, Debug)]
pub struct Ellpack<I: SegmentIndex> {
    sizes: Vec<I>,
    width: usize,
    alignment: usize,
    organization: ElementsOrganization,
    state: LayoutState,
}

impl<I: SegmentIndex> Default for Ellpack<I> {
    fn default() -> Self {
        Self::new(ElementsOrganization::RowMajor)
    }
}

impl<I: SegmentIndex> Ellpack<I> {
    /// Create an uninitialized layout
    pub fn new(organization: ElementsOrganization) -> Self {
        Self {
            sizes: Vec::new(),
            width: 0,
            alignment: DEFAULT_ALIGNMENT,
            organization,
            state: LayoutState::Uninitialized,
        }
    }

    /// Create an uninitialized layout with a custom column-major alignment
    pub fn with_alignment(organization: ElementsOrganization, alignment: usize) -> Result<Self> {
        if alignment == 0 {
            return Err(Error::invalid_argument("alignment", "must be at least 1"));
        }
        Ok(Self {
            alignment,
            ..Self::new(organization)
        })
    }

    /// `count` segments that all hold `width` elements
    pub fn with_uniform_size(
        count: usize,
        width: usize,
        organization: ElementsOrganization,
    ) -> Result<Self> {
        let size = I::try_from_usize(width, "segment width")?;
        let mut layout = Self::new(organization);
        layout.check_geometry(count, width)?;
        layout.set_segments_sizes(&vec![size; count])?;
        Ok(layout)
    }

    /// Build from sizes with an explicit organization
    pub fn from_sizes_with(sizes: &[I], organization: ElementsOrganization) -> Result<Self> {
        let mut layout = Self::new(organization);
        layout.set_segments_sizes(sizes)?;
        Ok(layout)
    }

    /// Slots per segment
    pub fn width(&self) -> usize {
        self.width
    }

    /// Segment-count alignment for column-major placement
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Distance between consecutive slots of one segment
    fn stride(&self) -> usize {
        match self.organization {
            ElementsOrganization::RowMajor => 1,
            ElementsOrganization::ColumnMajor => {
                round_up(self.sizes.len(), self.alignment).unwrap_or(usize::MAX)
            }
        }
    }

    /// Value-preserving conversion to another index type
    pub fn convert<J: SegmentIndex>(&self) -> Result<Ellpack<J>> {
        let sizes = self
            .sizes
            .iter()
            .map(|&s| J::try_from_usize(s.as_usize(), "segment size"))
            .collect::<Result<Vec<_>>>()?;
        // Storage must also fit the narrower type.
        J::try_from_usize(self.storage(), "storage size")?;
        Ok(Ellpack {
            sizes,
            width: self.width,
            alignment: self.alignment,
            organization: self.organization,
            state: self.state,
        })
    }

    /// Padded segment count and storage size, checked against `I`
    fn check_geometry(&self, count: usize, width: usize) -> Result<(usize, usize)> {
        let rows = match self.organization {
            ElementsOrganization::RowMajor => count,
            ElementsOrganization::ColumnMajor => {
                round_up(count, self.alignment).ok_or(Error::IndexOverflow {
                    what: "aligned segment count",
                    value: count as u128,
                    index_type: "usize",
                })?
            }
        };
        let storage = checked_mul::<I>(rows, width, "storage size")?;
        I::try_from_usize(storage, "storage size")?;
        I::try_from_usize(rows, "aligned segment count")?;
        Ok((rows, storage))
    }

    fn storage(&self) -> usize {
        match self.organization {
            ElementsOrganization::RowMajor => self.sizes.len() * self.width,
            ElementsOrganization::ColumnMajor => self.stride() * self.width,
        }
    }
}

impl<I: SegmentIndex, J: SegmentIndex> PartialEq<Ellpack<J>> for Ellpack<I> {
    fn eq(&self, other: &Ellpack<J>) -> bool {
        self.state == other.state
            && self.organization == other.organization
            && (self.organization == ElementsOrganization::RowMajor
                || self.alignment == other.alignment)
            && self.sizes.len() == other.sizes.len()
            && self
                .sizes
                .iter()
                .zip(&other.sizes)
                .all(|(a, b)| a.try_as_usize() == b.try_as_usize())
    }
}

impl<I: SegmentIndex> Eq for Ellpack<I> {}

/// Borrowed view of [`Ellpack`]
#[derive(Copy, Clone, Debug)]
pub struct EllpackView<'a, I> {
    sizes: &'a [I],
    width: usize,
    stride: usize,
    storage: usize,
    organization: ElementsOrganization,
}

impl<I: SegmentIndex> SegmentsView for EllpackView<'_, I> {
    #[inline]
    fn segments_count(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    fn storage_size(&self) -> usize {
        self.storage
    }

    #[inline]
    fn segment_size(&self, segment: usize) -> usize {
        self.sizes[segment].as_usize()
    }

    #[inline]
    fn segment_capacity(&self, _segment: usize) -> usize {
        self.width
    }

    #[inline]
    fn global_index(&self, segment: usize, local: usize) -> usize {
        debug_assert!(local < self.width);
        match self.organization {
            ElementsOrganization::RowMajor => segment * self.width + local,
            ElementsOrganization::ColumnMajor => segment + local * self.stride,
        }
    }

    fn segment(&self, segment: usize) -> SegmentView {
        let (begin, step) = match self.organization {
            ElementsOrganization::RowMajor => (segment * self.width, 1),
            ElementsOrganization::ColumnMajor => (segment, self.stride),
        };
        SegmentView::strided(segment, self.segment_size(segment), self.width, begin, step)
    }
}

impl<I: SegmentIndex> Segments<I> for Ellpack<I> {
    type View<'a> = EllpackView<'a, I>;

    fn kind(&self) -> SegmentsKind {
        SegmentsKind::Ellpack
    }

    fn organization(&self) -> ElementsOrganization {
        self.organization
    }

    fn state(&self) -> LayoutState {
        self.state
    }

    fn set_segments_sizes(&mut self, sizes: &[I]) -> Result<()> {
        let counts = sizes_to_usize(sizes)?;
        let width = counts.iter().copied().max().unwrap_or(0);
        let (_, storage) = self.check_geometry(counts.len(), width)?;

        tracing::debug!(
            segments = counts.len(),
            width,
            storage,
            organization = %self.organization,
            "sized Ellpack layout"
        );
        self.sizes = sizes.to_vec();
        self.width = width;
        self.state = LayoutState::Sized;
        Ok(())
    }

    fn reset(&mut self) {
        self.sizes.clear();
        self.width = 0;
        self.state = LayoutState::Uninitialized;
    }

    fn view(&self) -> EllpackView<'_, I> {
        EllpackView {
            sizes: &self.sizes,
            width: self.width,
            stride: self.stride(),
            storage: self.storage(),
            organization: self.organization,
        }
    }

    fn header_params(&self) -> [u64; 3] {
        [self.alignment as u64, self.width as u64, 0]
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_array(writer, &self.sizes)
    }

    fn read_body<R: Read>(header: &Header, reader: &mut R) -> Result<Self> {
        header.expect_layout::<I>(SegmentsKind::Ellpack)?;
        let mut layout = Self::with_alignment(header.organization, header.param(0)?)?;
        layout.set_segments_sizes(&read_array::<I, _>(reader)?)?;
        if layout.width != header.param(1)? {
            return Err(Error::invalid_argument(
                "width",
                format!("stored width {} does not match sizes (max {})", header.params[1], layout.width),
            ));
        }
        Ok(layout)
    }

    fn kernel_geometry(&self) -> Option<KernelGeometry<'_, I>> {
        Some(KernelGeometry::Padded {
            sizes: &self.sizes,
            width: self.width,
            stride: self.stride(),
            organization: self.organization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_geometry() {
        let ell = Ellpack::<i32>::from_sizes(&[3, 0, 2]).unwrap();
        assert_eq!(ell.width(), 3);
        assert_eq!(ell.storage_size(), 9);
        assert_eq!(ell.global_index(2, 1).unwrap(), 7);
        assert_eq!(ell.segment_size(2).unwrap(), 2);
        assert_eq!(ell.segment_capacity(2).unwrap(), 3);
        assert!(ell.global_index(2, 2).is_err());
    }

    #[test]
    fn test_column_major_geometry() {
        let ell = Ellpack::<u32>::from_sizes_with(&[3, 0, 2], ElementsOrganization::ColumnMajor)
            .unwrap();
        assert_eq!(ell.storage_size(), 32 * 3);
        assert_eq!(ell.global_index(0, 2).unwrap(), 64);
        assert_eq!(ell.global_index(2, 1).unwrap(), 34);
        let view = ell.view();
        let slots: Vec<_> = view.segment(2).slots().map(|e| (e.global, e.padding)).collect();
        assert_eq!(slots, vec![(2, false), (34, false), (66, true)]);
    }

    #[test]
    fn test_uniform_size() {
        let ell = Ellpack::<i64>::with_uniform_size(4, 5, ElementsOrganization::RowMajor).unwrap();
        assert_eq!(ell.segments_sizes().unwrap(), vec![5; 4]);
        assert_eq!(ell.storage_size(), 20);
    }

    #[test]
    fn test_width_overflow_detected_before_allocation() {
        let mut sizes = vec![0i32; 70_000];
        sizes[0] = 40_000;
        let mut ell = Ellpack::<i32>::new(ElementsOrganization::RowMajor);
        assert!(matches!(
            ell.set_segments_sizes(&sizes),
            Err(Error::IndexOverflow { .. })
        ));
        assert_eq!(ell.state(), LayoutState::Uninitialized);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        assert!(Ellpack::<i32>::with_alignment(ElementsOrganization::ColumnMajor, 0).is_err());
    }

    #[test]
    fn test_uniform_count_overflow_rejected() {
        let count = i32::MAX as usize + 1;
        assert!(matches!(
            Ellpack::<i32>::with_uniform_size(count, 1, ElementsOrganization::RowMajor),
            Err(Error::IndexOverflow { .. })
        ));
        assert!(matches!(
            Ellpack::<i64>::with_uniform_size(usize::MAX, 2, ElementsOrganization::ColumnMajor),
            Err(Error::IndexOverflow { .. })
        ));
    }

    #[test]
    fn test_alignment_ignored_for_row_major_equality() {
        let mut a = Ellpack::<i32>::with_alignment(ElementsOrganization::RowMajor, 4).unwrap();
        let mut b = Ellpack::<i32>::with_alignment(ElementsOrganization::RowMajor, 32).unwrap();
        a.set_segments_sizes(&[2, 1]).unwrap();
        b.set_segments_sizes(&[2, 1]).unwrap();
        assert_eq!(a, b);

        let mut c = Ellpack::<i32>::with_alignment(ElementsOrganization::ColumnMajor, 4).unwrap();
        let mut d = Ellpack::<i32>::with_alignment(ElementsOrganization::ColumnMajor, 32).unwrap();
        c.set_segments_sizes(&[2, 1]).unwrap();
        d.set_segments_sizes(&[2, 1]).unwrap();
        assert_ne!(c, d);
    }
}
