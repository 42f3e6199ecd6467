//! CSR segments: prefix-sum offsets, no padding

use super::{
    KernelGeometry, LayoutState, SegmentView, Segments, SegmentsKind, SegmentsView,
};
use crate::dtype::SegmentIndex;
use crate::dtype::index::{checked_prefix_sum, sizes_to_usize, to_index_vec};
use crate::error::{Error, Result};
use crate::io::{Header, read_array, write_array};
use std::io::{Read, Write};

/// Compressed sparse row segments
///
/// `offsets[s]..offsets[s + 1]` is the slot range of segment `s`.
#[derive(Clone, Debug, Default)]
pub struct Csr<I: SegmentIndex> {
    offsets: Vec<I>,
    state: LayoutState,
}

impl<I: SegmentIndex> Csr<I> {
    /// Create an uninitialized layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit offsets
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `offsets` is non-empty, starts at zero and
    /// never decreases.
    pub fn from_offsets(offsets: Vec<I>) -> Result<Self> {
        validate_offsets(&offsets)?;
        Ok(Self {
            offsets,
            state: LayoutState::Sized,
        })
    }

    /// The offsets array (`segments + 1` entries once sized)
    pub fn offsets(&self) -> &[I] {
        &self.offsets
    }

    /// Value-preserving conversion to another index type
    ///
    /// # Errors
    ///
    /// `IndexOverflow` if an offset does not fit `J`.
    pub fn convert<J: SegmentIndex>(&self) -> Result<Csr<J>> {
        let offsets = self
            .offsets
            .iter()
            .map(|&o| J::try_from_usize(o.as_usize(), "offset"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Csr {
            offsets,
            state: self.state,
        })
    }
}

fn validate_offsets<I: SegmentIndex>(offsets: &[I]) -> Result<()> {
    match offsets.first() {
        None => return Err(Error::invalid_argument("offsets", "at least one offset required")),
        Some(first) if !first.is_zero() => {
            return Err(Error::invalid_argument("offsets", format!("first offset is {first}, not 0")));
        }
        _ => {}
    }
    if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::invalid_argument(
            "offsets",
            format!("offsets decrease at segment {i}: {} > {}", offsets[i], offsets[i + 1]),
        ));
    }
    Ok(())
}

impl<I: SegmentIndex, J: SegmentIndex> PartialEq<Csr<J>> for Csr<I> {
    fn eq(&self, other: &Csr<J>) -> bool {
        self.state == other.state
            && self.offsets.len() == other.offsets.len()
            && self
                .offsets
                .iter()
                .zip(&other.offsets)
                .all(|(a, b)| a.try_as_usize() == b.try_as_usize())
    }
}

impl<I: SegmentIndex> Eq for Csr<I> {}

/// Borrowed view of [`Csr`]
#[derive(Copy, Clone, Debug)]
pub struct CsrView<'a, I> {
    offsets: &'a [I],
}

impl<I: SegmentIndex> CsrView<'_, I> {
    #[inline]
    fn begin(&self, segment: usize) -> usize {
        self.offsets[segment].as_usize()
    }
}

impl<I: SegmentIndex> SegmentsView for CsrView<'_, I> {
    #[inline]
    fn segments_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    #[inline]
    fn storage_size(&self) -> usize {
        self.offsets.last().map_or(0, |o| o.as_usize())
    }

    #[inline]
    fn segment_size(&self, segment: usize) -> usize {
        self.begin(segment + 1) - self.begin(segment)
    }

    #[inline]
    fn global_index(&self, segment: usize, local: usize) -> usize {
        debug_assert!(local < self.segment_size(segment));
        self.begin(segment) + local
    }

    fn segment(&self, segment: usize) -> SegmentView {
        let size = self.segment_size(segment);
        SegmentView::strided(segment, size, size, self.begin(segment), 1)
    }

    fn total_size(&self) -> usize {
        self.storage_size()
    }
}

impl<I: SegmentIndex> Segments<I> for Csr<I> {
    type View<'a> = CsrView<'a, I>;

    fn kind(&self) -> SegmentsKind {
        SegmentsKind::Csr
    }

    fn state(&self) -> LayoutState {
        self.state
    }

    fn set_segments_sizes(&mut self, sizes: &[I]) -> Result<()> {
        let sizes = sizes_to_usize(sizes)?;
        let prefix = checked_prefix_sum(&sizes, "storage size")?;
        let offsets = to_index_vec::<I>(&prefix, "storage size")?;

        tracing::debug!(
            segments = sizes.len(),
            storage = prefix[sizes.len()],
            "sized CSR layout"
        );
        self.offsets = offsets;
        self.state = LayoutState::Sized;
        Ok(())
    }

    fn reset(&mut self) {
        self.offsets.clear();
        self.state = LayoutState::Uninitialized;
    }

    fn view(&self) -> CsrView<'_, I> {
        CsrView {
            offsets: &self.offsets,
        }
    }

    fn write_body<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_array(writer, &self.offsets)
    }

    fn read_body<R: Read>(header: &Header, reader: &mut R) -> Result<Self> {
        header.expect_layout::<I>(SegmentsKind::Csr)?;
        Self::from_offsets(read_array(reader)?)
    }

    fn kernel_geometry(&self) -> Option<KernelGeometry<'_, I>> {
        Some(KernelGeometry::Offsets(&self.offsets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_three_zero_two() {
        let csr = Csr::<i32>::from_sizes(&[3, 0, 2]).unwrap();
        assert_eq!(csr.offsets(), &[0, 3, 3, 5]);
        assert_eq!(csr.storage_size(), 5);
        assert_eq!(csr.global_index(0, 2).unwrap(), 2);
        assert_eq!(csr.global_index(2, 1).unwrap(), 4);
        assert_eq!(csr.segment_size(1).unwrap(), 0);
        assert!(matches!(
            csr.global_index(1, 0),
            Err(Error::CapacityExceeded {
                segment: 1,
                local: 0,
                size: 0
            })
        ));
    }

    #[test]
    fn test_failed_sizing_keeps_previous_geometry() {
        let mut csr = Csr::<i32>::from_sizes(&[1, 2]).unwrap();
        let err = csr.set_segments_sizes(&[i32::MAX, 1]).unwrap_err();
        assert!(matches!(err, Error::IndexOverflow { .. }));
        assert_eq!(csr.offsets(), &[0, 1, 3]);
        assert_eq!(csr.state(), LayoutState::Sized);
    }

    #[test]
    fn test_from_offsets_validation() {
        assert!(Csr::<u32>::from_offsets(vec![]).is_err());
        assert!(Csr::<u32>::from_offsets(vec![1, 2]).is_err());
        assert!(Csr::<u32>::from_offsets(vec![0, 3, 2]).is_err());
        assert_eq!(Csr::<u32>::from_offsets(vec![0]).unwrap().segments_count(), 0);
    }

    #[test]
    fn test_convert_and_compare_across_index_types() {
        let narrow = Csr::<i32>::from_sizes(&[4, 1, 0, 7]).unwrap();
        let wide: Csr<u64> = narrow.convert().unwrap();
        assert!(narrow == wide);
        assert_eq!(wide.offsets(), &[0, 4, 5, 5, 12]);

        let big = Csr::<i64>::from_offsets(vec![0, i64::from(i32::MAX) + 1]).unwrap();
        assert!(matches!(
            big.convert::<i32>(),
            Err(Error::IndexOverflow { .. })
        ));
    }

    #[test]
    fn test_reset() {
        let mut csr = Csr::<i64>::from_sizes(&[2, 2]).unwrap();
        csr.reset();
        assert_eq!(csr.state(), LayoutState::Uninitialized);
        assert_eq!(csr.segments_count(), 0);
        assert_eq!(csr.storage_size(), 0);
    }
}
