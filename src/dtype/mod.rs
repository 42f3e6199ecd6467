//! Data types for segment values and segment indices
//!
//! Two families of element types flow through the crate:
//!
//! - **Values** ([`Element`]): what a sparse matrix stores per slot and what
//!   reduction kernels combine. IEEE binary32/64 plus 32/64-bit integers.
//! - **Indices** ([`SegmentIndex`]): the integer type used for every piece of
//!   layout metadata (offsets, permutations, group pointers, column indices).
//!
//! [`DType`] is the runtime tag for both families. It is what the persistence
//! format records so that a file written with one index or value type is never
//! reinterpreted as another.

mod element;
pub(crate) mod index;

pub use element::Element;
pub use index::SegmentIndex;

use std::fmt;

/// Runtime tag for value and index types
///
/// Discriminants are part of the on-disk format and never change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,

    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,

    /// 64-bit unsigned integer
    U64 = 20,
    /// 32-bit unsigned integer
    U32 = 21,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 | Self::U64 => 8,
            Self::F32 | Self::I32 | Self::U32 => 4,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Returns true if this is any integer type (signed or unsigned)
    #[inline]
    pub const fn is_int(self) -> bool {
        !self.is_float()
    }

    /// Short name for display (e.g., "f32", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::U32 => "u32",
        }
    }

    /// Stable one-byte tag used by the persistence format
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Inverse of [`DType::tag`]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::F64),
            1 => Some(Self::F32),
            10 => Some(Self::I64),
            11 => Some(Self::I32),
            20 => Some(Self::U64),
            21 => Some(Self::U32),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
