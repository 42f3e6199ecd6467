//! Index types for segment layout metadata

use super::DType;
use crate::error::{Error, Result};
use bytemuck::Pod;
use num_traits::{NumCast, PrimInt};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Integer type used for offsets, permutations, group pointers and column
/// indices
///
/// Implemented for `i32`, `i64`, `u32` and `u64`. Layouts compute their
/// geometry in `usize` and convert into the index type before allocating any
/// metadata, so a geometry that does not fit is reported as
/// [`Error::IndexOverflow`] instead of wrapping.
pub trait SegmentIndex:
    PrimInt + Pod + Default + Hash + Debug + Display + Send + Sync + 'static
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// CUDA C spelling of this type, used by generated kernels
    const CUDA_TYPE: &'static str;

    /// Suffix for integer literals of this type in CUDA C
    const CUDA_SUFFIX: &'static str;

    /// Direct conversion for values already known to be valid positions
    ///
    /// Only checked in debug builds.
    fn as_usize(self) -> usize;

    /// Checked conversion to `usize`; `None` for negative values
    #[inline]
    fn try_as_usize(self) -> Option<usize> {
        <usize as NumCast>::from(self)
    }

    /// Checked conversion from `usize`
    ///
    /// `what` names the quantity in the overflow error.
    #[inline]
    fn try_from_usize(value: usize, what: &'static str) -> Result<Self> {
        <Self as NumCast>::from(value).ok_or(Error::IndexOverflow {
            what,
            value: value as u128,
            index_type: Self::DTYPE.short_name(),
        })
    }

    /// Marker stored in column-index slots that hold no element
    #[inline]
    fn padding() -> Self {
        Self::max_value()
    }

    /// Returns true if this value is the padding marker
    #[inline]
    fn is_padding(self) -> bool {
        self == Self::padding()
    }
}

macro_rules! impl_segment_index {
    ($ty:ty, $dtype:expr, $cuda:expr, $suffix:expr) => {
        impl SegmentIndex for $ty {
            const DTYPE: DType = $dtype;
            const CUDA_TYPE: &'static str = $cuda;
            const CUDA_SUFFIX: &'static str = $suffix;

            #[inline]
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn as_usize(self) -> usize {
                debug_assert!(
                    self.try_as_usize().is_some(),
                    "index {} is not a valid position",
                    self
                );
                self as usize
            }
        }
    };
}

impl_segment_index!(i32, DType::I32, "int", "");
impl_segment_index!(i64, DType::I64, "long long", "LL");
impl_segment_index!(u32, DType::U32, "unsigned int", "U");
impl_segment_index!(u64, DType::U64, "unsigned long long", "ULL");

/// Convert a whole `usize` slice into the index type, failing on the first
/// value that does not fit
pub(crate) fn to_index_vec<I: SegmentIndex>(values: &[usize], what: &'static str) -> Result<Vec<I>> {
    values
        .iter()
        .map(|&v| I::try_from_usize(v, what))
        .collect()
}

/// Value-preserving conversion between index types
pub(crate) fn convert_index_vec<I: SegmentIndex, J: SegmentIndex>(
    values: &[I],
    what: &'static str,
) -> Result<Vec<J>> {
    values
        .iter()
        .map(|&v| J::try_from_usize(v.as_usize(), what))
        .collect()
}

/// Convert caller-provided sizes to `usize`, rejecting negative values
pub(crate) fn sizes_to_usize<I: SegmentIndex>(sizes: &[I]) -> Result<Vec<usize>> {
    sizes
        .iter()
        .enumerate()
        .map(|(segment, &size)| {
            size.try_as_usize().ok_or_else(|| Error::InvalidArgument {
                arg: "sizes",
                reason: format!("segment {segment} has negative size {size}"),
            })
        })
        .collect()
}

/// Checked exclusive prefix sum; the result has `values.len() + 1` entries
pub(crate) fn checked_prefix_sum(values: &[usize], what: &'static str) -> Result<Vec<usize>> {
    let mut out = Vec::with_capacity(values.len() + 1);
    let mut acc = 0usize;
    out.push(0);
    for &v in values {
        acc = acc.checked_add(v).ok_or(Error::IndexOverflow {
            what,
            value: acc as u128 + v as u128,
            index_type: "usize",
        })?;
        out.push(acc);
    }
    Ok(out)
}

/// Checked product that reports overflow against the index type `I`
pub(crate) fn checked_mul<I: SegmentIndex>(a: usize, b: usize, what: &'static str) -> Result<usize> {
    a.checked_mul(b).ok_or(Error::IndexOverflow {
        what,
        value: a as u128 * b as u128,
        index_type: I::DTYPE.short_name(),
    })
}
