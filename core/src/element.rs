//! Numeric element kinds a [`Matrix`](crate::Matrix) can hold.
//!
//! The set is closed: `f32`, `f64`, `i32` and `i64`. Each kind implements
//! [`Element`] exactly once, so generic code picks the accumulation width
//! from the type parameter and mixed-type arithmetic does not type-check.
//!
//! Kernels accumulate through [`Element::wrapping_add`] and
//! [`Element::wrapping_mul`]. Integer kinds wrap in two's complement on
//! overflow, in debug and release builds alike; float kinds use IEEE
//! arithmetic and saturate to infinity.

use core::fmt;
use core::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

use crate::math;

/// Runtime tag for an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    /// Width of one element in bytes.
    pub const fn size_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// A scalar kind usable as matrix storage.
///
/// Sealed: only the four kinds named by [`DType`] implement it.
pub trait Element:
    Copy
    + Default
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Mul<Output = Self>
    + sealed::Sealed
{
    const DTYPE: DType;
    const ZERO: Self;

    /// Converts from `f64`. Integer kinds truncate toward zero.
    fn from_f64(value: f64) -> Self;

    /// `self + rhs` in this kind's width, wrapping for integers.
    fn wrapping_add(self, rhs: Self) -> Self;

    /// `self * rhs` in this kind's width, wrapping for integers.
    fn wrapping_mul(self, rhs: Self) -> Self;

    /// `x` if `x > 0`, else `x * negative_slope`.
    fn leaky_relu(self, negative_slope: f64) -> Self;

    /// Logistic function, evaluated without overflow for large `|x|`.
    fn sigmoid(self) -> Self;

    /// `sum / count` in this element's arithmetic.
    fn mean(sum: Self, count: usize) -> Self;
}

macro_rules! impl_float_element {
    ($ty:ty, $dtype:expr, $sigmoid:path) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;
            const ZERO: Self = 0.0;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline]
            fn leaky_relu(self, negative_slope: f64) -> Self {
                if self > 0.0 {
                    self
                } else {
                    self * negative_slope as $ty
                }
            }

            #[inline]
            fn sigmoid(self) -> Self {
                $sigmoid(self)
            }

            #[inline]
            fn mean(sum: Self, count: usize) -> Self {
                sum / count as $ty
            }
        }
    };
}

macro_rules! impl_int_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;
            const ZERO: Self = 0;

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            // Resolves to the inherent method, not this one.
            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }

            #[inline]
            fn wrapping_mul(self, rhs: Self) -> Self {
                <$ty>::wrapping_mul(self, rhs)
            }

            #[inline]
            fn leaky_relu(self, negative_slope: f64) -> Self {
                if self > 0 {
                    self
                } else {
                    (self as f64 * negative_slope) as $ty
                }
            }

            #[inline]
            fn sigmoid(self) -> Self {
                math::sigmoid_f64(self as f64) as $ty
            }

            #[inline]
            fn mean(sum: Self, count: usize) -> Self {
                sum / count as $ty
            }
        }
    };
}

impl_float_element!(f32, DType::F32, math::sigmoid_f32);
impl_float_element!(f64, DType::F64, math::sigmoid_f64);
impl_int_element!(i32, DType::I32);
impl_int_element!(i64, DType::I64);
