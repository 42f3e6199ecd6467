//! Element trait for mapping Rust value types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

/// Trait for types that can be stored in segment slots and combined by
/// reduction kernels
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - values cross thread boundaries freely
/// - `Pod + Zeroable` - verbatim persistence and host/device transfers (bytemuck)
/// - `Add + Sub + Mul + Div` - arithmetic used by the built-in reductions
/// - `PartialOrd` - comparison for min/max reductions
pub trait Element:
    Copy
    + Clone
    + Send
    + Sync
    + Pod
    + Zeroable
    + Debug
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Neutral element of `max` (negative infinity for floats)
    fn lowest() -> Self;

    /// Neutral element of `min` (positive infinity for floats)
    fn highest() -> Self;

    /// Absolute value (identity for unsigned types)
    fn abs_value(self) -> Self;
}

macro_rules! impl_float_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn lowest() -> Self {
                <$ty>::NEG_INFINITY
            }

            #[inline]
            fn highest() -> Self {
                <$ty>::INFINITY
            }

            #[inline]
            fn abs_value(self) -> Self {
                self.abs()
            }
        }
    };
}

macro_rules! impl_int_element {
    ($ty:ty, $dtype:expr, signed) => {
        impl_int_element!(@impl $ty, $dtype, |v: $ty| v.wrapping_abs());
    };
    ($ty:ty, $dtype:expr, unsigned) => {
        impl_int_element!(@impl $ty, $dtype, |v: $ty| v);
    };
    (@impl $ty:ty, $dtype:expr, $abs:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn lowest() -> Self {
                <$ty>::MIN
            }

            #[inline]
            fn highest() -> Self {
                <$ty>::MAX
            }

            #[inline]
            fn abs_value(self) -> Self {
                ($abs)(self)
            }
        }
    };
}

impl_float_element!(f64, DType::F64);
impl_float_element!(f32, DType::F32);
impl_int_element!(i64, DType::I64, signed);
impl_int_element!(i32, DType::I32, signed);
impl_int_element!(u64, DType::U64, unsigned);
impl_int_element!(u32, DType::U32, unsigned);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtypes() {
        assert_eq!(f64::DTYPE, DType::F64);
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(i32::DTYPE, DType::I32);
        assert_eq!(u64::DTYPE, DType::U64);
    }

    #[test]
    fn test_reduction_identities() {
        assert_eq!(f64::lowest(), f64::NEG_INFINITY);
        assert_eq!(f32::highest(), f32::INFINITY);
        assert_eq!(i32::lowest(), i32::MIN);
        assert_eq!(u32::highest(), u32::MAX);
    }

    #[test]
    fn test_abs_value() {
        assert_eq!((-2.5f64).abs_value(), 2.5);
        assert_eq!((-7i64).abs_value(), 7);
        assert_eq!(7u32.abs_value(), 7);
    }
}
