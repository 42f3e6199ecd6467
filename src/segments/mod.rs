//! Segmented storage layouts
//!
//! A layout maps `(segment, local)` pairs to positions in one flat buffer of
//! `storage_size` slots. Every layout implements [`Segments`] and hands out a
//! borrowed [`SegmentsView`] for kernels.
//!
//! | Layout | Metadata | Padding |
//! |--------|----------|---------|
//! | [`Csr`] | `segments + 1` offsets | none |
//! | [`Ellpack`] | sizes, one width | every segment padded to the widest |
//! | [`SlicedEllpack`] | sizes, per-slice offsets | padded to the widest in its slice |
//! | [`BiEllpack`] | sizes, permutation, group pointers | at most 2x the stored elements |
//!
//! Sizes are always kept, so [`Segments::segment_size`] returns the logical
//! size the layout was built from on every layout. Padded layouts also expose
//! the slot count per segment through [`SegmentsView::segment_capacity`];
//! slots with `local >= size` are padding.

mod any;
mod bi_ellpack;
mod csr;
mod descriptor;
mod ellpack;
pub mod kernels;
mod sliced_ellpack;
mod traverse;

pub use any::{AnySegments, AnySegmentsView};
pub use bi_ellpack::{BiEllpack, BiEllpackView};
pub use csr::{Csr, CsrView};
pub use descriptor::{SegmentElement, SegmentGroup, SegmentMapping, SegmentSlots, SegmentView};
pub use ellpack::{Ellpack, EllpackView};
pub use sliced_ellpack::{SlicedEllpack, SlicedEllpackView};
pub use traverse::{for_elements, for_segments, for_slots};

pub use crate::runtime::WARP_SIZE;

use crate::dtype::SegmentIndex;
use crate::error::{Error, Result};
use crate::io::Header;
use std::fmt;
use std::io::{Read, Write};
use std::ops::Range;

/// Default segment-count alignment of column-major Ellpack
pub const DEFAULT_ALIGNMENT: usize = 32;

/// Physical placement of a segment's slots in padded layouts
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ElementsOrganization {
    /// A segment's slots are contiguous
    #[default]
    RowMajor,
    /// Slot `l` of consecutive segments is contiguous (coalesced on GPUs)
    ColumnMajor,
}

impl ElementsOrganization {
    /// Stable tag used by the persistence format
    pub const fn tag(self) -> u8 {
        match self {
            Self::RowMajor => 0,
            Self::ColumnMajor => 1,
        }
    }

    /// Inverse of [`ElementsOrganization::tag`]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::RowMajor),
            1 => Some(Self::ColumnMajor),
            _ => None,
        }
    }
}

impl fmt::Display for ElementsOrganization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowMajor => f.write_str("row-major"),
            Self::ColumnMajor => f.write_str("column-major"),
        }
    }
}

/// The closed set of layout variants
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentsKind {
    /// Compressed sparse row offsets
    Csr,
    /// Uniformly padded rows
    Ellpack,
    /// Rows padded per slice
    SlicedEllpack,
    /// Strips sorted by length, split into power-of-two groups
    BiEllpack,
}

impl SegmentsKind {
    /// Stable tag used by the persistence format
    pub const fn tag(self) -> u8 {
        match self {
            Self::Csr => 0,
            Self::Ellpack => 1,
            Self::SlicedEllpack => 2,
            Self::BiEllpack => 3,
        }
    }

    /// Inverse of [`SegmentsKind::tag`]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Csr),
            1 => Some(Self::Ellpack),
            2 => Some(Self::SlicedEllpack),
            3 => Some(Self::BiEllpack),
            _ => None,
        }
    }

    /// Human-readable layout name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Csr => "CSR",
            Self::Ellpack => "Ellpack",
            Self::SlicedEllpack => "SlicedEllpack",
            Self::BiEllpack => "BiEllpack",
        }
    }

    /// Returns true if the layout stores padding slots
    pub const fn is_padded(self) -> bool {
        !matches!(self, Self::Csr)
    }
}

impl fmt::Display for SegmentsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of a layout or of a container built on one
///
/// Layouts are `Uninitialized` or `Sized`; a sparse matrix becomes `Ready`
/// once its value buffers exist.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutState {
    /// No sizes set (or reset)
    #[default]
    Uninitialized,
    /// Geometry computed
    Sized,
    /// Geometry computed and element buffers allocated
    Ready,
}

/// Geometry in the form device kernels consume
#[derive(Copy, Clone, Debug)]
pub enum KernelGeometry<'a, I> {
    /// Prefix-sum offsets (CSR)
    Offsets(&'a [I]),
    /// Uniform width padding (Ellpack)
    Padded {
        /// Logical sizes
        sizes: &'a [I],
        /// Slots per segment
        width: usize,
        /// Distance between slot `l` and `l + 1` in column-major order
        stride: usize,
        /// Placement
        organization: ElementsOrganization,
    },
}

/// Borrowed, unchecked access to a layout's geometry
///
/// All methods assume valid arguments and only check them with
/// `debug_assert!`. They agree with the checked methods on [`Segments`] for
/// every valid input. Views are `Copy` and are shared by all workers of a
/// kernel.
pub trait SegmentsView: Copy + Send + Sync {
    /// Number of segments
    fn segments_count(&self) -> usize;

    /// Number of slots in the flat buffer, padding included
    fn storage_size(&self) -> usize;

    /// Logical size of `segment`
    fn segment_size(&self, segment: usize) -> usize;

    /// Slots owned by `segment`, padding included
    fn segment_capacity(&self, segment: usize) -> usize {
        self.segment_size(segment)
    }

    /// Flat position of slot `local` of `segment`; valid for
    /// `local < segment_capacity(segment)`
    fn global_index(&self, segment: usize, local: usize) -> usize;

    /// Descriptor of one segment
    fn segment(&self, segment: usize) -> SegmentView;

    /// Sum of all logical sizes
    fn total_size(&self) -> usize {
        (0..self.segments_count()).map(|s| self.segment_size(s)).sum()
    }
}

/// A segmented storage layout
///
/// # Lifecycle
///
/// A layout starts `Uninitialized`. [`Segments::set_segments_sizes`] computes
/// the whole geometry into fresh buffers and swaps them in only when every
/// value fits the index type, so a failed call leaves the previous geometry
/// untouched. [`Segments::reset`] returns to `Uninitialized`.
pub trait Segments<I: SegmentIndex>: Clone + fmt::Debug + Default + Send + Sync {
    /// Borrowed view type
    type View<'a>: SegmentsView
    where
        Self: 'a;

    /// Layout variant
    fn kind(&self) -> SegmentsKind;

    /// Slot placement
    fn organization(&self) -> ElementsOrganization {
        ElementsOrganization::RowMajor
    }

    /// Current state
    fn state(&self) -> LayoutState;

    /// Build the geometry for `sizes`
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a size is negative
    /// - `IndexOverflow` if a geometry value does not fit `I`
    fn set_segments_sizes(&mut self, sizes: &[I]) -> Result<()>;

    /// Drop the geometry
    fn reset(&mut self);

    /// Borrowed view for kernels
    fn view(&self) -> Self::View<'_>;

    /// Layout-specific header parameters
    fn header_params(&self) -> [u64; 3] {
        [0; 3]
    }

    /// Write the metadata arrays
    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Rebuild a layout from its header and metadata arrays
    fn read_body<R: Read>(header: &Header, reader: &mut R) -> Result<Self>;

    /// Geometry for device kernels, if the layout has a device kernel
    fn kernel_geometry(&self) -> Option<KernelGeometry<'_, I>> {
        None
    }

    /// Build a layout from sizes with default parameters
    fn from_sizes(sizes: &[I]) -> Result<Self> {
        let mut layout = Self::default();
        layout.set_segments_sizes(sizes)?;
        Ok(layout)
    }

    /// Number of segments
    fn segments_count(&self) -> usize {
        self.view().segments_count()
    }

    /// Number of slots, padding included
    fn storage_size(&self) -> usize {
        self.view().storage_size()
    }

    /// Logical size of `segment`
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if the segment does not exist.
    fn segment_size(&self, segment: usize) -> Result<I> {
        let view = self.view();
        check_segment(segment, view.segments_count())?;
        I::try_from_usize(view.segment_size(segment), "segment size")
    }

    /// Slots owned by `segment`, padding included
    fn segment_capacity(&self, segment: usize) -> Result<usize> {
        let view = self.view();
        check_segment(segment, view.segments_count())?;
        Ok(view.segment_capacity(segment))
    }

    /// Flat position of element `local` of `segment`
    ///
    /// # Errors
    ///
    /// - `IndexOutOfBounds` if the segment does not exist
    /// - `CapacityExceeded` if `local >= segment_size(segment)`
    fn global_index(&self, segment: usize, local: usize) -> Result<I> {
        let view = self.view();
        check_segment(segment, view.segments_count())?;
        let size = view.segment_size(segment);
        if local >= size {
            return Err(Error::CapacityExceeded {
                segment,
                local,
                size,
            });
        }
        I::try_from_usize(view.global_index(segment, local), "global index")
    }

    /// The sizes this layout was built from
    fn segments_sizes(&self) -> Result<Vec<I>> {
        let view = self.view();
        (0..view.segments_count())
            .map(|s| I::try_from_usize(view.segment_size(s), "segment size"))
            .collect()
    }

    /// Serialize header and metadata
    fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.state() == LayoutState::Uninitialized {
            return Err(Error::NotInitialized { what: "layout" });
        }
        Header::for_layout(self, None).write(writer)?;
        self.write_body(writer)
    }

    /// Deserialize a layout written by [`Segments::save`]
    ///
    /// The stored organization is kept; see [`Segments::load_organized`] to
    /// require one.
    ///
    /// # Errors
    ///
    /// `IncompatibleLayout` if the stream holds another layout variant or
    /// index type.
    fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let header = Header::read(reader)?;
        header.expect_value(None)?;
        Self::read_body(&header, reader)
    }

    /// Deserialize a layout that must use `organization`
    ///
    /// # Errors
    ///
    /// `IncompatibleLayout` if the stream holds another layout variant,
    /// organization or index type.
    fn load_organized<R: Read>(reader: &mut R, organization: ElementsOrganization) -> Result<Self> {
        let header = Header::read(reader)?;
        header.expect_value(None)?;
        header.expect_organization(organization)?;
        Self::read_body(&header, reader)
    }
}

#[inline]
pub(crate) fn check_segment(segment: usize, count: usize) -> Result<()> {
    if segment >= count {
        return Err(Error::IndexOutOfBounds {
            index: segment,
            size: count,
        });
    }
    Ok(())
}

/// Validate a segment range against a segment count
pub(crate) fn check_range(range: &Range<usize>, count: usize) -> Result<()> {
    if range.start > range.end {
        return Err(Error::invalid_argument(
            "range",
            format!("start {} is past end {}", range.start, range.end),
        ));
    }
    if range.end > count {
        return Err(Error::IndexOutOfBounds {
            index: range.end,
            size: count,
        });
    }
    Ok(())
}

/// Round `value` up to a multiple of `multiple`
pub(crate) fn round_up(value: usize, multiple: usize) -> Option<usize> {
    value.div_ceil(multiple).checked_mul(multiple)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        for kind in [
            SegmentsKind::Csr,
            SegmentsKind::Ellpack,
            SegmentsKind::SlicedEllpack,
            SegmentsKind::BiEllpack,
        ] {
            assert_eq!(SegmentsKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(
            ElementsOrganization::from_tag(ElementsOrganization::ColumnMajor.tag()),
            Some(ElementsOrganization::ColumnMajor)
        );
        assert_eq!(SegmentsKind::from_tag(9), None);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(&(0..3), 3).is_ok());
        assert!(matches!(
            check_range(&(1..4), 3),
            Err(Error::IndexOutOfBounds { index: 4, size: 3 })
        ));
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = 2..1;
        assert!(check_range(&reversed, 3).is_err());
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 32), Some(0));
        assert_eq!(round_up(33, 32), Some(64));
        assert_eq!(round_up(usize::MAX, 32), None);
    }
}
