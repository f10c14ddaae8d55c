use std::sync::Arc;

use derive_more::{Deref, Display, From, Into};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Extents of a multidimensional array, outermost axis first.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, Hash, Deref, From, Into, Display, Serialize, Deserialize,
)]
#[display("[{}]", _0.iter().format(", "))]
pub struct Shape(Arc<[usize]>);

impl From<Vec<usize>> for Shape {
    #[inline]
    fn from(value: Vec<usize>) -> Self {
        Self(value.into())
    }
}

impl From<&[usize]> for Shape {
    #[inline]
    fn from(value: &[usize]) -> Self {
        Self(value.into())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    #[inline]
    fn from(value: [usize; N]) -> Self {
        Self(value.into())
    }
}

impl Shape {
    /// Number of elements covered by the shape. A rank-0 shape covers one.
    #[inline]
    pub fn size(&self) -> usize {
        self.iter().product()
    }

    /// Row-major strides.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.len()];
        for axis in (0..self.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self[axis + 1];
        }
        strides
    }

    /// Linear offset of `index`. Returns `None` if the index has the wrong rank or is out of bounds.
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.len() || index.iter().zip_eq(self.iter()).any(|(i, s)| i >= s) {
            return None;
        }
        let offset = index
            .iter()
            .zip_eq(self.strides())
            .map(|(i, stride)| i * stride)
            .sum();
        Some(offset)
    }

    /// Inverse of [`Shape::offset`].
    pub fn unravel(&self, mut offset: usize) -> Vec<usize> {
        let mut index = vec![0; self.len()];
        for (axis, &extent) in self.iter().enumerate().rev() {
            index[axis] = offset % extent;
            offset /= extent;
        }
        index
    }

    /// Iterates every index of the shape in row-major order.
    pub fn indices(&self) -> impl Iterator<Item = Vec<usize>> + use<> {
        let shape = self.clone();
        (0..self.size()).map(move |offset| shape.unravel(offset))
    }

    /// Reorders the axes so that axis `k` of the output is axis `axes[k]` of `self`.
    pub fn permute(&self, axes: &[usize]) -> Shape {
        axes.iter().map(|&axis| self[axis]).collect_vec().into()
    }

    /// Drops the listed axes, keeping the order of the rest.
    pub fn remove(&self, axes: &[usize]) -> Shape {
        self.iter()
            .enumerate()
            .filter(|(axis, _)| !axes.contains(axis))
            .map(|(_, &extent)| extent)
            .collect_vec()
            .into()
    }

    /// Concatenates two shapes.
    pub fn concat(&self, other: &Shape) -> Shape {
        self.iter().chain(other.iter()).copied().collect_vec().into()
    }

    /// Element-wise quotient of `self` by `block`. Returns `None` on rank mismatch or
    /// when some extent is not divisible by the block extent.
    pub fn div_exact(&self, block: &Shape) -> Option<Shape> {
        if self.len() != block.len() {
            return None;
        }
        self.iter()
            .zip_eq(block.iter())
            .map(|(&s, &b)| (b != 0 && s % b == 0).then(|| s / b))
            .collect::<Option<Vec<_>>>()
            .map(Into::into)
    }
}

/// Returns `true` if no entry of `axes` repeats.
pub fn is_unique(axes: &[usize]) -> bool {
    axes.iter().all_unique()
}

/// Returns `true` if `axes` is a permutation of `0..rank`.
pub fn is_permutation(axes: &[usize], rank: usize) -> bool {
    axes.len() == rank && is_unique(axes) && axes.iter().all(|&axis| axis < rank)
}
