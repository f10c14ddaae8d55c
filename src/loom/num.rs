use std::ops::{Add, Mul};

use bytemuck::{Pod, Zeroable};
use derive_more::Display;
use half::f16;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum DataType {
    F16,
    F32,
    F64,
    I32,
    I64,
}

impl DataType {
    /// Returns the size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::F16 => 2,
            DataType::F32 => 4,
            DataType::F64 => 8,
            DataType::I32 => 4,
            DataType::I64 => 8,
        }
    }
}

pub trait Zero {
    fn zero() -> Self;
}

impl Zero for f16 {
    fn zero() -> Self {
        Self::ZERO
    }
}

impl Zero for f32 {
    fn zero() -> Self {
        0.0
    }
}

impl Zero for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Zero for i32 {
    fn zero() -> Self {
        0
    }
}

impl Zero for i64 {
    fn zero() -> Self {
        0
    }
}

pub trait One {
    fn one() -> Self;
}

impl One for f16 {
    fn one() -> Self {
        Self::ONE
    }
}

impl One for f32 {
    fn one() -> Self {
        1.0
    }
}

impl One for f64 {
    fn one() -> Self {
        1.0
    }
}

impl One for i32 {
    fn one() -> Self {
        1
    }
}

impl One for i64 {
    fn one() -> Self {
        1
    }
}

pub trait Scalar:
    Sized
    + Zeroable
    + Pod
    + Zero
    + One
    + Add<Output = Self>
    + Mul<Output = Self>
    + PartialEq
    + std::fmt::Debug
    + Send
    + Sync
    + 'static
{
    const DATA_TYPE: DataType;

    #[inline]
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

pub trait Float: Scalar {
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Scalar for f16 {
    const DATA_TYPE: DataType = DataType::F16;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for f64 {
    const DATA_TYPE: DataType = DataType::F64;
}

impl Scalar for i32 {
    const DATA_TYPE: DataType = DataType::I32;
}

impl Scalar for i64 {
    const DATA_TYPE: DataType = DataType::I64;
}

impl Float for f16 {
    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
}

impl Float for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Float for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// Expands `$body` once per data type, binding `$t` to the matching [`Scalar`].
#[macro_export]
macro_rules! dispatch_type {
    ($type:expr, $t:ident => $body:expr) => {
        match $type {
            $crate::loom::num::DataType::F16 => {
                type $t = ::half::f16;
                $body
            }
            $crate::loom::num::DataType::F32 => {
                type $t = f32;
                $body
            }
            $crate::loom::num::DataType::F64 => {
                type $t = f64;
                $body
            }
            $crate::loom::num::DataType::I32 => {
                type $t = i32;
                $body
            }
            $crate::loom::num::DataType::I64 => {
                type $t = i64;
                $body
            }
        }
    };
}
