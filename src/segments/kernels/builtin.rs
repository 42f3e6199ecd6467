//! Reductions with a closed description
//!
//! Closures cannot cross to the device, so reductions that must run on
//! every backend are described by value instead: what to fetch per element
//! and how to combine. Host kernels evaluate the description directly; the
//! CUDA backend generates a kernel from it.

use crate::dtype::Element;
use std::fmt;

/// What each stored element contributes
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// The stored value
    #[default]
    Value,
    /// The stored value times `x[column]`
    ValueTimesVector,
    /// Absolute value of the stored value
    AbsValue,
}

impl FetchKind {
    /// Name used in generated kernel identifiers
    pub const fn name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::ValueTimesVector => "value_times_vector",
            Self::AbsValue => "abs_value",
        }
    }

    /// Returns true if the fetch reads an input vector
    pub const fn needs_vector(self) -> bool {
        matches!(self, Self::ValueTimesVector)
    }

    /// Contribution of one stored element
    ///
    /// `x` is only read for [`FetchKind::ValueTimesVector`]; callers check
    /// its length beforehand.
    #[inline]
    pub fn apply<T: Element>(self, value: T, column: usize, x: &[T]) -> T {
        match self {
            Self::Value => value,
            Self::ValueTimesVector => value * x[column],
            Self::AbsValue => value.abs_value(),
        }
    }
}

/// How contributions are combined
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Addition, identity zero
    #[default]
    Sum,
    /// Maximum, identity the lowest value of the type
    Max,
    /// Minimum, identity the highest value of the type
    Min,
}

impl ReduceOp {
    /// Name used in generated kernel identifiers
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Neutral element
    #[inline]
    pub fn identity<T: Element>(self) -> T {
        match self {
            Self::Sum => T::zero(),
            Self::Max => T::lowest(),
            Self::Min => T::highest(),
        }
    }

    /// Combine two partial results
    ///
    /// `Max` and `Min` keep `a` unless `b` compares strictly greater (or
    /// less), so a NaN in `b` is dropped and a NaN in `a` is kept. The
    /// generated CUDA kernels use the same comparison.
    #[inline]
    pub fn combine<T: Element>(self, a: T, b: T) -> T {
        match self {
            Self::Sum => a + b,
            Self::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
            Self::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
        }
    }
}

/// A fetch and a combine, executable on every backend
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SegmentReduction {
    /// Per-element contribution
    pub fetch: FetchKind,
    /// Combine operation
    pub op: ReduceOp,
}

impl SegmentReduction {
    /// Reduction from its parts
    pub const fn new(fetch: FetchKind, op: ReduceOp) -> Self {
        Self { fetch, op }
    }

    /// Sum of stored values
    pub const fn sum() -> Self {
        Self::new(FetchKind::Value, ReduceOp::Sum)
    }

    /// Largest stored value
    pub const fn max() -> Self {
        Self::new(FetchKind::Value, ReduceOp::Max)
    }

    /// Smallest stored value
    pub const fn min() -> Self {
        Self::new(FetchKind::Value, ReduceOp::Min)
    }

    /// Sum of absolute values
    pub const fn abs_sum() -> Self {
        Self::new(FetchKind::AbsValue, ReduceOp::Sum)
    }

    /// Row times vector
    pub const fn dot() -> Self {
        Self::new(FetchKind::ValueTimesVector, ReduceOp::Sum)
    }
}

impl fmt::Display for SegmentReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.op.name(), self.fetch.name())
    }
}
