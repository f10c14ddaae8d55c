use itertools::Itertools;

use super::{
    shape::{Shape, is_permutation},
    slice::Slice,
};

/// A dense row-major container addressed by grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    shape: Shape,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Builds a grid by calling `f` once per coordinate, in row-major order.
    pub fn from_fn<E>(
        shape: impl Into<Shape>,
        mut f: impl FnMut(&[usize]) -> Result<T, E>,
    ) -> Result<Self, E> {
        let shape = shape.into();
        let cells = shape
            .indices()
            .map(|coord| f(&coord))
            .collect::<Result<_, _>>()?;
        Ok(Self { shape, cells })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, coord: &[usize]) -> Option<&T> {
        self.shape.offset(coord).map(|offset| &self.cells[offset])
    }

    /// Cells selected by `slice`, in row-major order of the selection.
    pub fn select(&self, slice: &Slice) -> Option<Vec<&T>> {
        if !slice.fits(&self.shape) {
            return None;
        }
        slice
            .coords(&self.shape)
            .iter()
            .map(|coord| self.get(coord))
            .collect()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.cells.iter_mut()
    }

    /// Reorders the grid axes in place so that axis `k` becomes old axis `axes[k]`.
    ///
    /// Returns `false` and leaves the grid untouched if `axes` is not a permutation.
    pub fn permute(&mut self, axes: &[usize]) -> bool {
        if !is_permutation(axes, self.shape.len()) {
            return false;
        }
        let shape = self.shape.permute(axes);
        let strides = shape.strides();
        let mut cells = std::mem::take(&mut self.cells)
            .into_iter()
            .enumerate()
            .map(|(offset, cell)| {
                let coord = self.shape.unravel(offset);
                let dest: usize = axes
                    .iter()
                    .zip_eq(strides.iter())
                    .map(|(&axis, stride)| coord[axis] * stride)
                    .sum();
                (dest, cell)
            })
            .collect_vec();
        cells.sort_unstable_by_key(|&(dest, _)| dest);
        self.cells = cells.into_iter().map(|(_, cell)| cell).collect();
        self.shape = shape;
        true
    }
}
