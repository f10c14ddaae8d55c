use std::sync::Arc;

use casey::snake;
use derive_more::{Deref, DerefMut, Display, From, Into};
use itertools::Itertools;

use super::shape::Shape;

/// Selection along one grid axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Axis {
    #[default]
    #[display("..")]
    Full,
    #[display("{_0}")]
    One(usize),
}

impl From<usize> for Axis {
    #[inline]
    fn from(value: usize) -> Self {
        Self::One(value)
    }
}

impl From<std::ops::RangeFull> for Axis {
    #[inline]
    fn from(_: std::ops::RangeFull) -> Self {
        Self::Full
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deref, DerefMut, From, Into, Display)]
#[display("[{}]", _0.iter().format(", "))]
pub struct Slice(Arc<[Axis]>);

impl From<Vec<Axis>> for Slice {
    #[inline]
    fn from(value: Vec<Axis>) -> Self {
        Self(value.into())
    }
}

macro_rules! impl_slice_from {
    ($t:ident) => {
        impl<$t: Into<Axis>> From<$t> for Slice {
            #[inline]
            fn from(snake!($t): $t) -> Self {
                Self([snake!($t).into()].into())
            }
        }
    };
    ($($t:ident),+) => {
        impl<$($t),+> From<($($t),+)> for Slice
        where
            $($t: Into<Axis>),+
        {
            #[inline]
            fn from(($(snake!($t)),+): ($($t),+)) -> Self {
                Self([$(snake!($t).into()),+].into())
            }
        }
    };
}

impl_slice_from!(T0);
impl_slice_from!(T0, T1);
impl_slice_from!(T0, T1, T2);
impl_slice_from!(T0, T1, T2, T3);
impl_slice_from!(T0, T1, T2, T3, T4);
impl_slice_from!(T0, T1, T2, T3, T4, T5);
impl_slice_from!(T0, T1, T2, T3, T4, T5, T6);
impl_slice_from!(T0, T1, T2, T3, T4, T5, T6, T7);

impl Slice {
    /// Creates a slice that pins every axis to `index`.
    #[inline]
    pub fn point(index: &[usize]) -> Self {
        Self::from(index.iter().copied().map(Axis::One).collect_vec())
    }

    /// Checks that the slice has the rank of `shape` and pins no axis out of bounds.
    pub fn fits(&self, shape: &Shape) -> bool {
        self.len() == shape.len()
            && self
                .iter()
                .zip_eq(shape.iter())
                .all(|(&axis, &extent)| match axis {
                    Axis::Full => true,
                    Axis::One(index) => index < extent,
                })
    }

    /// Every coordinate selected inside `shape`, in row-major order.
    ///
    /// The caller must have checked [`Slice::fits`].
    pub fn coords(&self, shape: &Shape) -> Vec<Vec<usize>> {
        let ranges = self
            .iter()
            .zip_eq(shape.iter())
            .map(|(&axis, &extent)| match axis {
                Axis::Full => 0..extent,
                Axis::One(index) => index..index + 1,
            })
            .collect_vec();
        let extents: Shape = ranges.iter().map(|range| range.len()).collect_vec().into();
        extents
            .indices()
            .map(|index| {
                index
                    .into_iter()
                    .zip_eq(ranges.iter())
                    .map(|(i, range)| range.start + i)
                    .collect()
            })
            .collect()
    }
}
