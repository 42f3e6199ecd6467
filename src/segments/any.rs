//! Closed sum of all layouts

use super::{
    BiEllpack, BiEllpackView, Csr, CsrView, ElementsOrganization, Ellpack, EllpackView,
    KernelGeometry, LayoutState, SegmentView, Segments, SegmentsKind, SegmentsView, SlicedEllpack,
    SlicedEllpackView,
};
use crate::dtype::SegmentIndex;
use crate::error::Result;
use crate::io::Header;
use std::io::{Read, Write};

/// Any layout, chosen at runtime
///
/// Dispatches every [`Segments`] operation to the wrapped layout. Loading an
/// `AnySegments` accepts whichever variant the stream holds.
#[derive(Clone, Debug)]
pub enum AnySegments<I: SegmentIndex> {
    /// CSR
    Csr(Csr<I>),
    /// Ellpack
    Ellpack(Ellpack<I>),
    /// SlicedEllpack
    SlicedEllpack(SlicedEllpack<I>),
    /// BiEllpack
    BiEllpack(BiEllpack<I>),
}

impl<I: SegmentIndex> Default for AnySegments<I> {
    fn default() -> Self {
        Self::Csr(Csr::default())
    }
}

impl<I: SegmentIndex> AnySegments<I> {
    /// Uninitialized layout of the given kind
    pub fn new(kind: SegmentsKind, organization: ElementsOrganization) -> Self {
        match kind {
            SegmentsKind::Csr => Self::Csr(Csr::new()),
            SegmentsKind::Ellpack => Self::Ellpack(Ellpack::new(organization)),
            SegmentsKind::SlicedEllpack => Self::SlicedEllpack(SlicedEllpack::new(organization)),
            SegmentsKind::BiEllpack => Self::BiEllpack(BiEllpack::new(organization)),
        }
    }

    /// Build a layout of the given kind from sizes
    pub fn with_sizes(
        kind: SegmentsKind,
        organization: ElementsOrganization,
        sizes: &[I],
    ) -> Result<Self> {
        let mut layout = Self::new(kind, organization);
        layout.set_segments_sizes(sizes)?;
        Ok(layout)
    }

    /// Value-preserving conversion to another index type
    pub fn convert<J: SegmentIndex>(&self) -> Result<AnySegments<J>> {
        Ok(match self {
            Self::Csr(l) => AnySegments::Csr(l.convert()?),
            Self::Ellpack(l) => AnySegments::Ellpack(l.convert()?),
            Self::SlicedEllpack(l) => AnySegments::SlicedEllpack(l.convert()?),
            Self::BiEllpack(l) => AnySegments::BiEllpack(l.convert()?),
        })
    }
}

macro_rules! dispatch {
    ($self:expr, $layout:ident => $body:expr) => {
        match $self {
            AnySegments::Csr($layout) => $body,
            AnySegments::Ellpack($layout) => $body,
            AnySegments::SlicedEllpack($layout) => $body,
            AnySegments::BiEllpack($layout) => $body,
        }
    };
}

macro_rules! dispatch_view {
    ($self:expr, $view:ident => $body:expr) => {
        match $self {
            AnySegmentsView::Csr($view) => $body,
            AnySegmentsView::Ellpack($view) => $body,
            AnySegmentsView::SlicedEllpack($view) => $body,
            AnySegmentsView::BiEllpack($view) => $body,
        }
    };
}

impl<I: SegmentIndex> From<Csr<I>> for AnySegments<I> {
    fn from(layout: Csr<I>) -> Self {
        Self::Csr(layout)
    }
}

impl<I: SegmentIndex> From<Ellpack<I>> for AnySegments<I> {
    fn from(layout: Ellpack<I>) -> Self {
        Self::Ellpack(layout)
    }
}

impl<I: SegmentIndex> From<SlicedEllpack<I>> for AnySegments<I> {
    fn from(layout: SlicedEllpack<I>) -> Self {
        Self::SlicedEllpack(layout)
    }
}

impl<I: SegmentIndex> From<BiEllpack<I>> for AnySegments<I> {
    fn from(layout: BiEllpack<I>) -> Self {
        Self::BiEllpack(layout)
    }
}

/// Borrowed view of [`AnySegments`]
#[derive(Copy, Clone, Debug)]
pub enum AnySegmentsView<'a, I> {
    /// CSR
    Csr(CsrView<'a, I>),
    /// Ellpack
    Ellpack(EllpackView<'a, I>),
    /// SlicedEllpack
    SlicedEllpack(SlicedEllpackView<'a, I>),
    /// BiEllpack
    BiEllpack(BiEllpackView<'a, I>),
}

impl<I: SegmentIndex> SegmentsView for AnySegmentsView<'_, I> {
    fn segments_count(&self) -> usize {
        dispatch_view!(self, v => v.segments_count())
    }

    fn storage_size(&self) -> usize {
        dispatch_view!(self, v => v.storage_size())
    }

    fn segment_size(&self, segment: usize) -> usize {
        dispatch_view!(self, v => v.segment_size(segment))
    }

    fn segment_capacity(&self, segment: usize) -> usize {
        dispatch_view!(self, v => v.segment_capacity(segment))
    }

    fn global_index(&self, segment: usize, local: usize) -> usize {
        dispatch_view!(self, v => v.global_index(segment, local))
    }

    fn segment(&self, segment: usize) -> SegmentView {
        dispatch_view!(self, v => v.segment(segment))
    }

    fn total_size(&self) -> usize {
        dispatch_view!(self, v => v.total_size())
    }
}

impl<I: SegmentIndex> Segments<I> for AnySegments<I> {
    type View<'a> = AnySegmentsView<'a, I>;

    fn kind(&self) -> SegmentsKind {
        dispatch!(self, l => l.kind())
    }

    fn organization(&self) -> ElementsOrganization {
        dispatch!(self, l => l.organization())
    }

    fn state(&self) -> LayoutState {
        dispatch!(self, l => l.state())
    }

    fn set_segments_sizes(&mut self, sizes: &[I]) -> Result<()> {
        dispatch!(self, l => l.set_segments_sizes(sizes))
    }

    fn reset(&mut self) {
        dispatch!(self, l => l.reset())
    }

    fn view(&self) -> AnySegmentsView<'_, I> {
        match self {
            Self::Csr(l) => AnySegmentsView::Csr(l.view()),
            Self::Ellpack(l) => AnySegmentsView::Ellpack(l.view()),
            Self::SlicedEllpack(l) => AnySegmentsView::SlicedEllpack(l.view()),
            Self::BiEllpack(l) => AnySegmentsView::BiEllpack(l.view()),
        }
    }

    fn header_params(&self) -> [u64; 3] {
        dispatch!(self, l => l.header_params())
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        dispatch!(self, l => l.write_body(writer))
    }

    fn read_body<R: Read>(header: &Header, reader: &mut R) -> Result<Self> {
        Ok(match header.kind {
            SegmentsKind::Csr => Self::Csr(Csr::read_body(header, reader)?),
            SegmentsKind::Ellpack => Self::Ellpack(Ellpack::read_body(header, reader)?),
            SegmentsKind::SlicedEllpack => {
                Self::SlicedEllpack(SlicedEllpack::read_body(header, reader)?)
            }
            SegmentsKind::BiEllpack => Self::BiEllpack(BiEllpack::read_body(header, reader)?),
        })
    }

    fn kernel_geometry(&self) -> Option<KernelGeometry<'_, I>> {
        dispatch!(self, l => l.kernel_geometry())
    }
}
